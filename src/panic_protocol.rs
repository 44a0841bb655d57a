// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Panic Protocol
//
// Two-state overload circuit breaker with hysteresis.
//
//   NORMAL  --(queue overflowing OR nav-mesh timeouts >= trigger)-->  GUARDED
//   GUARDED --(dwell >= min_guarded_ticks AND trigger clear)------->  NORMAL
//
// Entering GUARDED applies the degraded configuration atomically with the
// state change: stricter duplicate matching and a halved search budget.
// Leaving GUARDED reverts both.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GuardConfig;
use crate::governor::BudgetGovernor;
use crate::types::{OverloadState, Transition};

// ─── Collaborator seams ─────────────────────────────────────────────────────

/// Read-only view of the nav-mesh query layer's timeout streak.
pub trait TimeoutSignal {
    fn consecutive_timeouts(&self) -> u32;
}

/// Duplicate-request filter knob toggled on state transitions.
pub trait MatchingControl {
    fn set_stricter_matching(&mut self, stricter: bool);
}

impl TimeoutSignal for u32 {
    fn consecutive_timeouts(&self) -> u32 {
        *self
    }
}

// ─── Safety signals ─────────────────────────────────────────────────────────

/// Inputs sampled once per `check_safety_events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySignals {
    pub queue_overflowing: bool,
    pub consecutive_timeouts: u32,
}

// ─── PanicProtocol ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanicProtocol {
    state: OverloadState,
    entered_tick: u64,
    guarded_duration_ticks: u64,
    min_guarded_ticks: u64,
    timeout_trigger: u32,
}

impl PanicProtocol {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            state: OverloadState::Normal,
            entered_tick: 0,
            guarded_duration_ticks: 0,
            min_guarded_ticks: config.min_guarded_ticks,
            timeout_trigger: config.timeout_trigger,
        }
    }

    /// Whether these signals call for the degraded mode.
    pub fn is_triggered(&self, signals: &SafetySignals) -> bool {
        signals.queue_overflowing || signals.consecutive_timeouts >= self.timeout_trigger
    }

    /// Evaluate overload signals for `tick` and transition if warranted.
    ///
    /// Re-triggering while already GUARDED is a no-op: the dwell timer is
    /// not restarted.
    pub fn check_safety_events<T, M>(
        &mut self,
        tick: u64,
        governor: &mut BudgetGovernor,
        timeouts: &T,
        matching: &mut M,
    ) -> Option<Transition>
    where
        T: TimeoutSignal + ?Sized,
        M: MatchingControl + ?Sized,
    {
        let signals = SafetySignals {
            queue_overflowing: governor.queue().is_overflowing(),
            consecutive_timeouts: timeouts.consecutive_timeouts(),
        };
        let triggered = self.is_triggered(&signals);

        match self.state {
            OverloadState::Normal if triggered => {
                Some(self.transition_to(OverloadState::Guarded, tick, governor, matching))
            }
            OverloadState::Normal => None,
            OverloadState::Guarded => {
                let dwell = tick.saturating_sub(self.entered_tick);
                self.guarded_duration_ticks = dwell;
                if dwell >= self.min_guarded_ticks && !triggered {
                    Some(self.transition_to(OverloadState::Normal, tick, governor, matching))
                } else {
                    None
                }
            }
        }
    }

    fn transition_to<M: MatchingControl + ?Sized>(
        &mut self,
        next: OverloadState,
        tick: u64,
        governor: &mut BudgetGovernor,
        matching: &mut M,
    ) -> Transition {
        let from = self.state;
        self.state = next;
        self.entered_tick = tick;
        self.guarded_duration_ticks = 0;

        info!(from = from.label(), to = next.label(), tick, "overload state transition");

        apply_mode(next, governor, matching);
        Transition { from, to: next, tick }
    }

    /// Operator escape hatch: back to NORMAL now, ignoring the dwell timer.
    pub fn force_reset<M: MatchingControl + ?Sized>(
        &mut self,
        tick: u64,
        governor: &mut BudgetGovernor,
        matching: &mut M,
    ) -> Option<Transition> {
        let from = self.state;
        self.state = OverloadState::Normal;
        self.entered_tick = tick;
        self.guarded_duration_ticks = 0;
        apply_mode(OverloadState::Normal, governor, matching);

        info!(from = from.label(), tick, "overload protocol force reset");
        (from != OverloadState::Normal).then_some(Transition {
            from,
            to: OverloadState::Normal,
            tick,
        })
    }

    // ─── State ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> OverloadState {
        self.state
    }

    pub fn is_guarded(&self) -> bool {
        self.state == OverloadState::Guarded
    }

    pub fn entered_tick(&self) -> u64 {
        self.entered_tick
    }

    /// Ticks spent in GUARDED as of the last check; zero while NORMAL.
    pub fn guarded_duration_ticks(&self) -> u64 {
        self.guarded_duration_ticks
    }

    pub fn min_guarded_ticks(&self) -> u64 {
        self.min_guarded_ticks
    }
}

fn apply_mode<M: MatchingControl + ?Sized>(
    state: OverloadState,
    governor: &mut BudgetGovernor,
    matching: &mut M,
) {
    let degraded = state == OverloadState::Guarded;
    matching.set_stricter_matching(degraded);
    governor.set_conservative_mode(degraded);
}

// ─── Tests ──────────────────────────────────────────────────────────────────
