// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Deferral Queue
//
// Holds requests that missed the tick budget, oldest first. Tracks per-actor
// consecutive drops so that no actor is refused indefinitely: once an actor
// has been dropped `max_consecutive_drops` times in a row, its next request
// is force-processed past both the queue ceiling and the budget.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::GuardConfig;
use crate::telemetry::{ReasonSink, TelemetryReason};
use crate::types::{EnqueueOutcome, PathRequest};

// ─── Drain report ───────────────────────────────────────────────────────────

/// Requests released by one `process_deferred` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    /// Fresh requests handed back for real processing, oldest first.
    pub drained: Vec<PathRequest>,
    /// Requests evicted for exceeding the stale age.
    pub stale: u32,
}

// ─── DeferQueue ─────────────────────────────────────────────────────────────

pub struct DeferQueue {
    queue: VecDeque<PathRequest>,
    consecutive_drops: HashMap<u32, u32>,
    sink: Option<Box<dyn ReasonSink>>,

    max_queue_size: usize,
    overflow_ratio: f64,
    drain_limit: u32,
    wander_priority: i32,
    far_distance_sq: f64,
    max_consecutive_drops: u32,
    stale_age_ticks: u64,

    /// Capacity drops plus stale evictions.
    dropped_count: u64,
    capacity_drops: u64,
    stale_count: u64,
    forced_count: u64,
    processed_count: u64,
}

impl DeferQueue {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            consecutive_drops: HashMap::new(),
            sink: None,
            max_queue_size: config.max_queue_size,
            overflow_ratio: config.overflow_ratio,
            drain_limit: GuardConfig::drain_limit(config.budget_per_tick),
            wander_priority: config.wander_priority,
            far_distance_sq: config.far_distance_sq,
            max_consecutive_drops: config.max_consecutive_drops,
            stale_age_ticks: config.stale_age_ticks,
            dropped_count: 0,
            capacity_drops: 0,
            stale_count: 0,
            forced_count: 0,
            processed_count: 0,
        }
    }

    pub fn with_sink(config: &GuardConfig, sink: Box<dyn ReasonSink>) -> Self {
        let mut q = Self::new(config);
        q.sink = Some(sink);
        q
    }

    /// Hand a request that missed the budget to the queue.
    pub fn enqueue(&mut self, request: PathRequest) -> EnqueueOutcome {
        let actor = request.actor_id;

        // Starved actors skip the queue entirely.
        let drops = self.consecutive_drops.get(&actor).copied().unwrap_or(0);
        if drops >= self.max_consecutive_drops {
            self.force_process(&request);
            self.consecutive_drops.remove(&actor);
            return EnqueueOutcome::Forced;
        }

        // The ceiling only protects against wander-priority, far traffic.
        if self.queue.len() >= self.max_queue_size
            && request.priority == self.wander_priority
            && request.distance_sq > self.far_distance_sq
        {
            *self.consecutive_drops.entry(actor).or_insert(0) += 1;
            self.dropped_count += 1;
            self.capacity_drops += 1;
            self.emit(TelemetryReason::PathRequestDropped);
            trace!(actor, drops = drops + 1, "path request dropped at queue ceiling");
            return EnqueueOutcome::Dropped;
        }

        self.queue.push_back(request);
        self.consecutive_drops.remove(&actor);
        self.emit(TelemetryReason::PathRequestDeferred);
        EnqueueOutcome::Queued
    }

    /// Drain the queue head-first at the start of `current_tick`.
    ///
    /// Stale heads are evicted without charging the budget. Every fresh
    /// request drained invokes `consume_budget` once. At least one fresh head
    /// is drained per call; draining stops at the next fresh head once
    /// `drain_limit` requests have been drained, whatever budget the caller
    /// has left.
    pub fn process_deferred<F: FnMut()>(
        &mut self,
        current_tick: u64,
        mut consume_budget: F,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        let mut processed: u32 = 0;

        while let Some(head) = self.queue.front() {
            if head.age_at(current_tick) > self.stale_age_ticks {
                self.queue.pop_front();
                self.dropped_count += 1;
                self.stale_count += 1;
                report.stale += 1;
                self.emit(TelemetryReason::PathRequestStale);
                continue;
            }

            if processed >= self.drain_limit.max(1) {
                break;
            }

            if let Some(fresh) = self.queue.pop_front() {
                consume_budget();
                processed += 1;
                self.processed_count += 1;
                report.drained.push(fresh);
            }
        }

        if processed > 0 || report.stale > 0 {
            debug!(
                tick = current_tick,
                processed,
                stale = report.stale,
                remaining = self.queue.len(),
                "drained deferred path requests"
            );
        }
        report
    }

    /// Starvation escape valve. The request proceeds exactly as if it had
    /// never been deferred; the queue only records that it happened.
    fn force_process(&mut self, request: &PathRequest) {
        self.forced_count += 1;
        self.emit(TelemetryReason::PathRequestForced);
        debug!(
            actor = request.actor_id,
            threshold = self.max_consecutive_drops,
            "force processing path request after consecutive drops"
        );
    }

    /// Forward a reason to the sink, if one is installed.
    pub(crate) fn emit(&mut self, reason: TelemetryReason) {
        if let Some(sink) = self.sink.as_mut() {
            sink.increment(reason);
        }
    }

    /// True at or above `overflow_ratio` of the ceiling. An overload signal,
    /// never an admission decision.
    pub fn is_overflowing(&self) -> bool {
        self.queue.len() as f64 >= self.max_queue_size as f64 * self.overflow_ratio
    }

    /// End-of-tick hook. Nothing is carried between ticks besides the queue.
    pub fn on_tick_end(&mut self) {}

    // ─── Configuration ──────────────────────────────────────────────────────

    pub fn set_max_queue_size(&mut self, size: usize) {
        self.max_queue_size = size;
    }

    /// Recompute the drain cap for a new nominal budget.
    pub fn set_nominal_budget(&mut self, budget_per_tick: u32) {
        self.drain_limit = GuardConfig::drain_limit(budget_per_tick);
    }

    // ─── Telemetry ──────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathRequest> {
        self.queue.iter()
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn drain_limit(&self) -> u32 {
        self.drain_limit
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    pub fn capacity_drop_count(&self) -> u64 {
        self.capacity_drops
    }

    pub fn stale_count(&self) -> u64 {
        self.stale_count
    }

    pub fn forced_count(&self) -> u64 {
        self.forced_count
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    pub fn consecutive_drops(&self, actor_id: u32) -> u32 {
        self.consecutive_drops.get(&actor_id).copied().unwrap_or(0)
    }

    /// Actors with at least one outstanding consecutive drop.
    pub fn starving_actors(&self) -> usize {
        self.consecutive_drops.len()
    }

    /// Longest outstanding drop streak across all actors.
    pub fn longest_drop_streak(&self) -> u32 {
        self.consecutive_drops.values().copied().max().unwrap_or(0)
    }
}

impl fmt::Debug for DeferQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferQueue")
            .field("len", &self.queue.len())
            .field("max_queue_size", &self.max_queue_size)
            .field("drain_limit", &self.drain_limit)
            .field("starving_actors", &self.consecutive_drops.len())
            .field("dropped_count", &self.dropped_count)
            .field("forced_count", &self.forced_count)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FAR_DIST_SQ, PRIORITY_CHASE, PRIORITY_WANDER};
    use crate::telemetry::SharedReasonStats;

    fn queue(budget: u32, max: usize) -> DeferQueue {
        DeferQueue::new(&GuardConfig::with_limits(budget, max))
    }

    fn wander_far(actor: u32, tick: u64) -> PathRequest {
        PathRequest::new(actor, PRIORITY_WANDER, FAR_DIST_SQ + 1.0, 0.0, 0.0, tick)
    }

    fn chase_near(actor: u32, tick: u64) -> PathRequest {
        PathRequest::new(actor, PRIORITY_CHASE, 100.0, 0.0, 0.0, tick)
    }

    fn fill(q: &mut DeferQueue, n: u32, tick: u64) {
        for i in 0..n {
            assert_eq!(q.enqueue(chase_near(1000 + i, tick)), EnqueueOutcome::Queued);
        }
    }

    #[test]
    fn enqueue_appends_in_fifo_order() {
        let mut q = queue(10, 5);
        q.enqueue(chase_near(1, 0));
        q.enqueue(chase_near(2, 0));
        q.enqueue(chase_near(3, 0));
        let order: Vec<u32> = q.iter().map(|r| r.actor_id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn full_queue_drops_only_wander_far() {
        let mut q = queue(10, 3);
        fill(&mut q, 3, 0);

        assert_eq!(q.enqueue(wander_far(1, 0)), EnqueueOutcome::Dropped);
        assert_eq!(q.consecutive_drops(1), 1);
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.capacity_drop_count(), 1);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn full_queue_still_accepts_consequential_requests() {
        let mut q = queue(10, 3);
        fill(&mut q, 3, 0);

        // Higher priority, far.
        let chase_far = PathRequest::new(2, PRIORITY_CHASE, FAR_DIST_SQ + 1.0, 0.0, 0.0, 0);
        assert_eq!(q.enqueue(chase_far), EnqueueOutcome::Queued);
        // Wander, but exactly at the far threshold (not beyond it).
        let wander_at = PathRequest::new(3, PRIORITY_WANDER, FAR_DIST_SQ, 0.0, 0.0, 0);
        assert_eq!(q.enqueue(wander_at), EnqueueOutcome::Queued);

        assert_eq!(q.len(), 5);
        assert_eq!(q.dropped_count(), 0);
    }

    #[test]
    fn starved_actor_is_forced_after_threshold_drops() {
        let mut q = queue(10, 2);
        fill(&mut q, 2, 0);

        for expected in 1..=3 {
            assert_eq!(q.enqueue(wander_far(9, 0)), EnqueueOutcome::Dropped);
            assert_eq!(q.consecutive_drops(9), expected);
        }
        assert_eq!(q.enqueue(wander_far(9, 0)), EnqueueOutcome::Forced);
        assert_eq!(q.consecutive_drops(9), 0);
        assert_eq!(q.forced_count(), 1);
        assert_eq!(q.len(), 2, "forced requests never enter the queue");
        assert_eq!(q.starving_actors(), 0);
        assert_eq!(q.longest_drop_streak(), 0);
    }

    #[test]
    fn successful_enqueue_resets_drop_streak() {
        let mut q = queue(10, 2);
        fill(&mut q, 2, 0);
        q.enqueue(wander_far(4, 0));
        q.enqueue(wander_far(4, 0));
        assert_eq!(q.consecutive_drops(4), 2);

        // Room frees up; the next request from the actor is queued.
        q.process_deferred(1, || {});
        assert_eq!(q.enqueue(wander_far(4, 1)), EnqueueOutcome::Queued);
        assert_eq!(q.consecutive_drops(4), 0);
    }

    #[test]
    fn drain_is_capped_at_half_nominal_budget() {
        let mut q = queue(6, 50);
        fill(&mut q, 10, 5);
        let mut charged = 0;
        let report = q.process_deferred(6, || charged += 1);
        assert_eq!(report.drained.len(), 3);
        assert_eq!(charged, 3);
        assert_eq!(q.len(), 7);
        assert_eq!(q.processed_count(), 3);
    }

    #[test]
    fn drain_evicts_stale_heads_without_charging() {
        let mut q = queue(10, 50);
        q.enqueue(chase_near(1, 10));
        q.enqueue(chase_near(2, 10));
        q.enqueue(chase_near(3, 12));

        let mut charged = 0;
        let report = q.process_deferred(13, || charged += 1);
        assert_eq!(report.stale, 2);
        assert_eq!(report.drained.iter().map(|r| r.actor_id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(charged, 1);
        assert_eq!(q.stale_count(), 2);
        assert_eq!(q.dropped_count(), 2);
    }

    #[test]
    fn age_of_exactly_stale_limit_is_still_processed() {
        let mut q = queue(10, 50);
        q.enqueue(chase_near(1, 10));
        let report = q.process_deferred(12, || {});
        assert_eq!(report.drained.len(), 1);
        assert_eq!(report.stale, 0);
    }

    #[test]
    fn single_unit_budget_still_drains_one_fresh_head() {
        let mut q = queue(1, 50);
        q.enqueue(chase_near(1, 0));
        fill(&mut q, 2, 5);
        let mut charged = 0;
        let report = q.process_deferred(6, || charged += 1);
        assert_eq!(report.drained.len(), 1);
        assert_eq!(report.stale, 1);
        assert_eq!(charged, 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn zero_budget_backlog_makes_progress() {
        let mut q = queue(0, 50);
        fill(&mut q, 3, 5);
        for tick in 5..8 {
            assert_eq!(q.process_deferred(tick, || {}).drained.len(), 1);
        }
        assert!(q.is_empty());
        assert_eq!(q.stale_count(), 0);
    }

    #[test]
    fn stale_heads_behind_the_cap_are_evicted_next_drain() {
        let mut q = queue(2, 50);
        fill(&mut q, 2, 10);
        q.enqueue(chase_near(9, 8));
        let first = q.process_deferred(10, || {});
        assert_eq!(first.drained.len(), 1);
        let second = q.process_deferred(11, || {});
        assert_eq!(second.drained.len(), 1);
        assert_eq!(second.stale, 1);
        assert!(q.is_empty());
    }

    #[test]
    fn nominal_budget_change_moves_drain_cap() {
        let mut q = queue(10, 50);
        assert_eq!(q.drain_limit(), 5);
        q.set_nominal_budget(40);
        assert_eq!(q.drain_limit(), 20);
    }

    #[test]
    fn overflow_signal_at_ninety_percent() {
        let mut q = queue(10, 10);
        fill(&mut q, 8, 0);
        assert!(!q.is_overflowing());
        q.enqueue(chase_near(1, 0));
        assert!(q.is_overflowing());
    }

    #[test]
    fn drop_reaches_sink() {
        let stats = SharedReasonStats::new();
        let mut q = DeferQueue::with_sink(
            &GuardConfig::with_limits(10, 1),
            Box::new(stats.clone()),
        );
        fill(&mut q, 1, 0);
        q.enqueue(wander_far(5, 0));
        assert_eq!(stats.count(TelemetryReason::PathRequestDropped), 1);
    }

    #[test]
    fn missing_sink_changes_nothing() {
        let stats = SharedReasonStats::new();
        let mut with = DeferQueue::with_sink(&GuardConfig::with_limits(10, 1), Box::new(stats));
        let mut without = queue(10, 1);
        for q in [&mut with, &mut without] {
            fill(q, 1, 0);
            for _ in 0..5 {
                q.enqueue(wander_far(5, 0));
            }
        }
        assert_eq!(with.dropped_count(), without.dropped_count());
        assert_eq!(with.forced_count(), without.forced_count());
        assert_eq!(with.len(), without.len());
    }
}
