// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Budget Governor
//
// Rations expensive searches per tick. Budget is reset (or halved under
// conservative mode) exactly once per tick, the backlog is drained against
// the fresh budget first, and only then do new requests compete for what
// is left. Unused budget never carries over.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{halve, GuardConfig};
use crate::defer_queue::{DeferQueue, DrainReport};
use crate::telemetry::ReasonSink;
use crate::types::{Admission, EnqueueOutcome, RequestContext};

// ─── Counters ───────────────────────────────────────────────────────────────

/// Monotonic admission counters, cleared only by `reset_telemetry`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorCounters {
    pub total_requests: u64,
    pub deferred_requests: u64,
    pub combat_bypass_count: u64,
}

// ─── BudgetGovernor ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct BudgetGovernor {
    queue: DeferQueue,
    budget_per_tick: u32,
    remaining_budget: u32,
    current_tick: u64,
    conservative_mode: bool,
    near_distance_sq: f64,
    combat_priority: i32,
    counters: GovernorCounters,
}

impl BudgetGovernor {
    pub fn new(config: &GuardConfig) -> Self {
        Self::with_queue(config, DeferQueue::new(config))
    }

    pub fn with_sink(config: &GuardConfig, sink: Box<dyn ReasonSink>) -> Self {
        Self::with_queue(config, DeferQueue::with_sink(config, sink))
    }

    fn with_queue(config: &GuardConfig, queue: DeferQueue) -> Self {
        Self {
            queue,
            budget_per_tick: config.budget_per_tick,
            remaining_budget: config.budget_per_tick,
            current_tick: 0,
            conservative_mode: false,
            near_distance_sq: config.near_distance_sq,
            combat_priority: config.combat_priority,
            counters: GovernorCounters::default(),
        }
    }

    /// Open `tick`: reset the budget, then drain the backlog against it.
    ///
    /// Must run exactly once per tick, before any `admit` for that tick.
    pub fn begin_tick(&mut self, tick: u64) -> DrainReport {
        self.current_tick = tick;
        self.remaining_budget = self.tick_budget();

        let remaining = &mut self.remaining_budget;
        self.queue
            .process_deferred(tick, || *remaining = remaining.saturating_sub(1))
    }

    /// Decide whether a request may search this tick.
    pub fn admit(&mut self, ctx: &RequestContext) -> Admission {
        self.counters.total_requests += 1;

        // Combat is never subject to scheduling pressure.
        if ctx.priority >= self.combat_priority || ctx.in_combat {
            self.counters.combat_bypass_count += 1;
            self.consume_budget();
            return Admission::CombatBypass;
        }

        if ctx.distance_sq < self.near_distance_sq && self.remaining_budget > 0 {
            self.consume_budget();
            return Admission::Admitted;
        }

        if self.remaining_budget > 0 {
            self.consume_budget();
            return Admission::Admitted;
        }

        self.counters.deferred_requests += 1;
        match self.queue.enqueue(ctx.to_request(self.current_tick)) {
            EnqueueOutcome::Queued => Admission::Deferred,
            EnqueueOutcome::Dropped => Admission::Dropped,
            EnqueueOutcome::Forced => Admission::Forced,
        }
    }

    /// Floors at zero; a bypass on an empty budget costs nothing.
    fn consume_budget(&mut self) {
        self.remaining_budget = self.remaining_budget.saturating_sub(1);
    }

    /// Budget granted at the next `begin_tick`.
    pub fn tick_budget(&self) -> u32 {
        if self.conservative_mode {
            halve(self.budget_per_tick)
        } else {
            self.budget_per_tick
        }
    }

    // ─── Configuration ──────────────────────────────────────────────────────

    /// Takes effect at the next `begin_tick`, never mid-tick.
    pub fn set_conservative_mode(&mut self, enabled: bool) {
        if enabled && !self.conservative_mode {
            info!(budget = halve(self.budget_per_tick), "conservative mode enabled");
        }
        self.conservative_mode = enabled;
    }

    pub fn set_budget_per_tick(&mut self, budget: u32) {
        self.budget_per_tick = budget;
        self.queue.set_nominal_budget(budget);
        // Keep 0 <= remaining <= ceiling when the ceiling shrinks mid-tick.
        self.remaining_budget = self.remaining_budget.min(self.tick_budget());
    }

    // ─── Telemetry ──────────────────────────────────────────────────────────

    pub fn budget_per_tick(&self) -> u32 {
        self.budget_per_tick
    }

    pub fn remaining_budget(&self) -> u32 {
        self.remaining_budget
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn is_conservative(&self) -> bool {
        self.conservative_mode
    }

    pub fn counters(&self) -> GovernorCounters {
        self.counters
    }

    pub fn total_requests(&self) -> u64 {
        self.counters.total_requests
    }

    pub fn deferred_requests(&self) -> u64 {
        self.counters.deferred_requests
    }

    pub fn combat_bypass_count(&self) -> u64 {
        self.counters.combat_bypass_count
    }

    pub fn reset_telemetry(&mut self) {
        self.counters = GovernorCounters::default();
    }

    pub fn queue(&self) -> &DeferQueue {
        &self.queue
    }

    pub(crate) fn queue_mut(&mut self) -> &mut DeferQueue {
        &mut self.queue
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FAR_DIST_SQ, PRIORITY_CHASE, PRIORITY_COMBAT, PRIORITY_WANDER};

    fn governor(budget: u32, max_queue: usize) -> BudgetGovernor {
        BudgetGovernor::new(&GuardConfig::with_limits(budget, max_queue))
    }

    fn near(actor: u32) -> RequestContext {
        RequestContext::new(actor, PRIORITY_CHASE, 100.0)
    }

    fn mid(actor: u32) -> RequestContext {
        RequestContext::new(actor, PRIORITY_CHASE, 2000.0)
    }

    #[test]
    fn begin_tick_resets_budget() {
        let mut g = governor(3, 10);
        g.begin_tick(1);
        g.admit(&near(1));
        g.admit(&near(2));
        assert_eq!(g.remaining_budget(), 1);
        g.begin_tick(2);
        assert_eq!(g.remaining_budget(), 3);
        assert_eq!(g.current_tick(), 2);
    }

    #[test]
    fn unused_budget_does_not_carry_over() {
        let mut g = governor(4, 10);
        g.begin_tick(1);
        g.begin_tick(2);
        assert_eq!(g.remaining_budget(), 4);
    }

    #[test]
    fn admits_until_budget_then_defers() {
        let mut g = governor(2, 10);
        g.begin_tick(10);
        assert_eq!(g.admit(&near(1)), Admission::Admitted);
        assert_eq!(g.admit(&mid(2)), Admission::Admitted);
        assert_eq!(g.admit(&near(3)), Admission::Deferred);
        assert_eq!(g.remaining_budget(), 0);
        assert_eq!(g.deferred_requests(), 1);
        assert_eq!(g.total_requests(), 3);

        let queued: Vec<_> = g.queue().iter().copied().collect();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].actor_id, 3);
        assert_eq!(queued[0].origin_tick, 10);
    }

    #[test]
    fn combat_priority_bypasses_empty_budget() {
        let mut g = governor(1, 10);
        g.begin_tick(1);
        g.admit(&near(1));
        assert_eq!(g.remaining_budget(), 0);

        let combat = RequestContext::new(2, PRIORITY_COMBAT, FAR_DIST_SQ * 4.0);
        assert_eq!(g.admit(&combat), Admission::CombatBypass);
        assert_eq!(g.remaining_budget(), 0, "consumption floors at zero");
        assert_eq!(g.combat_bypass_count(), 1);
        assert!(g.queue().is_empty());
    }

    #[test]
    fn in_combat_flag_bypasses_regardless_of_priority() {
        let mut g = governor(0, 10);
        g.begin_tick(1);
        let ctx = RequestContext::new(4, PRIORITY_WANDER, 10_000.0).in_combat(true);
        assert_eq!(g.admit(&ctx), Admission::CombatBypass);
    }

    #[test]
    fn combat_consumes_budget_when_available() {
        let mut g = governor(2, 10);
        g.begin_tick(1);
        g.admit(&RequestContext::new(1, PRIORITY_COMBAT, 0.0));
        assert_eq!(g.remaining_budget(), 1);
    }

    #[test]
    fn conservative_mode_halves_from_next_tick() {
        let mut g = governor(5, 10);
        g.begin_tick(1);
        g.set_conservative_mode(true);
        assert_eq!(g.remaining_budget(), 5, "not retroactive within the tick");
        g.begin_tick(2);
        assert_eq!(g.remaining_budget(), 2);
        g.set_conservative_mode(false);
        g.begin_tick(3);
        assert_eq!(g.remaining_budget(), 5);
    }

    #[test]
    fn drain_runs_against_fresh_budget_before_new_requests() {
        let mut g = governor(2, 5);
        g.begin_tick(10);
        g.admit(&near(1));
        g.admit(&near(2));
        assert_eq!(g.admit(&near(3)), Admission::Deferred);

        let report = g.begin_tick(11);
        assert_eq!(report.drained.len(), 1);
        assert_eq!(report.drained[0].actor_id, 3);
        assert_eq!(g.remaining_budget(), 1);
        assert_eq!(g.admit(&near(4)), Admission::Admitted);
        assert_eq!(g.admit(&near(5)), Admission::Deferred);
    }

    #[test]
    fn stale_request_is_discarded_not_charged() {
        let mut g = governor(2, 5);
        g.begin_tick(10);
        g.admit(&near(1));
        g.admit(&near(2));
        g.admit(&near(3));

        let report = g.begin_tick(13);
        assert!(report.drained.is_empty());
        assert_eq!(report.stale, 1);
        assert_eq!(g.remaining_budget(), 2);
        assert_eq!(g.queue().dropped_count(), 1);
    }

    #[test]
    fn deferral_into_full_queue_can_drop_then_force() {
        let mut g = governor(0, 1);
        g.begin_tick(1);
        assert_eq!(g.admit(&near(100)), Admission::Deferred);

        let wander_far = RequestContext::new(7, PRIORITY_WANDER, FAR_DIST_SQ + 1.0);
        for _ in 0..3 {
            assert_eq!(g.admit(&wander_far), Admission::Dropped);
        }
        assert_eq!(g.admit(&wander_far), Admission::Forced);
        assert!(g.admit(&wander_far) == Admission::Dropped);
        assert_eq!(g.deferred_requests(), 6);
    }

    #[test]
    fn shrinking_budget_clamps_remaining() {
        let mut g = governor(10, 5);
        g.begin_tick(1);
        g.set_budget_per_tick(4);
        assert_eq!(g.remaining_budget(), 4);
        assert_eq!(g.queue().drain_limit(), 2);
        g.begin_tick(2);
        assert_eq!(g.remaining_budget(), 4);
    }

    #[test]
    fn reset_telemetry_clears_counters_only() {
        let mut g = governor(1, 5);
        g.begin_tick(1);
        g.admit(&near(1));
        g.admit(&near(2));
        g.reset_telemetry();
        assert_eq!(g.counters(), GovernorCounters::default());
        assert_eq!(g.queue().len(), 1);
    }
}
