// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Simulation Core

use wasm_bindgen::prelude::*;

use crate::config::{ConfigError, GuardConfig};
use crate::guard::PathfindingGuard;
use crate::navmesh::QueryStatus;
use crate::panic_protocol::TimeoutSignal;
use crate::types::*;

// ─── GuardSimulation struct ─────────────────────────────────────────────────

/// Deterministic tick driver around a `PathfindingGuard`.
///
/// A tick is always open. Requests offered between two `tick_core` calls
/// belong to the open tick; `tick_core` closes it, reports it and opens the
/// next one.
#[wasm_bindgen]
pub struct GuardSimulation {
    pub(crate) guard: PathfindingGuard,
    pub(crate) current_tick: u64,
    pub(crate) open: TickResult,
    pub(crate) ticks_run: u64,
}

// ─── Internal Logic (Testable, pure Rust) ───────────────────────────────────

impl GuardSimulation {
    pub fn with_config(config: GuardConfig) -> Self {
        Self::from_guard(PathfindingGuard::new(config))
    }

    pub fn try_with_config(config: GuardConfig) -> Result<Self, ConfigError> {
        PathfindingGuard::try_new(config).map(Self::from_guard)
    }

    pub fn from_guard(guard: PathfindingGuard) -> Self {
        let mut sim = Self {
            guard,
            current_tick: 0,
            open: TickResult::default(),
            ticks_run: 0,
        };
        sim.open_tick(1);
        sim
    }

    fn open_tick(&mut self, tick: u64) {
        self.current_tick = tick;
        let start = self.guard.on_tick_start(tick);
        let drained = start.drained.len() as u32;
        self.open = TickResult {
            tick,
            budget: start.budget,
            drained,
            stale_evicted: start.stale_evicted,
            budget_spent: drained,
            transition: start.transition,
            ..TickResult::default()
        };
    }

    /// Offer one request to the open tick.
    pub fn offer(&mut self, ctx: &RequestContext) -> Admission {
        let admission = self.guard.check_path_request(ctx);
        let t = &mut self.open;
        t.offered += 1;
        match admission {
            Admission::Admitted => {
                t.admitted += 1;
                t.budget_spent += 1;
            }
            Admission::CombatBypass => t.combat_bypass += 1,
            Admission::Forced => t.forced += 1,
            Admission::Deferred => t.deferred += 1,
            Admission::Dropped => t.dropped += 1,
            Admission::Duplicate => t.duplicates += 1,
            Admission::Passthrough => {}
        }
        admission
    }

    /// Report a finished nav-mesh query; read at the next tick start.
    pub fn inject_navmesh_query(&mut self, elapsed_ms: u64) -> QueryStatus {
        self.guard.record_navmesh_query(elapsed_ms)
    }

    /// Close the open tick, open the next, and report the closed one.
    pub fn tick_core(&mut self) -> TickResult {
        let tick = self.current_tick;
        self.guard.on_tick_end(tick);

        let governor = self.guard.governor();
        let queue = governor.queue();
        let mut result = std::mem::take(&mut self.open);
        result.state = self.guard.state();
        result.queue_len = queue.len();
        result.remaining_budget = governor.remaining_budget();
        result.longest_drop_streak = queue.longest_drop_streak();
        result.consecutive_timeouts = self.guard.navmesh_guard().consecutive_timeouts();
        result.guarded_duration_ticks = self.guard.panic_protocol().guarded_duration_ticks();

        self.ticks_run += 1;
        self.open_tick(tick + 1);
        result
    }

    /// Counts accumulated so far for the open tick.
    pub fn open_tick_result(&self) -> &TickResult {
        &self.open
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn guard(&self) -> &PathfindingGuard {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut PathfindingGuard {
        &mut self.guard
    }

    pub fn status(&self) -> GuardStatus {
        self.guard.status()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
