// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Reason Telemetry
//
// Reason codes plus plain counters. No per-event payloads; hosts that want
// more detail subscribe to the `tracing` events instead.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

// ─── Reasons ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TelemetryReason {
    PathRequestDeferred,
    PathRequestDropped,
    PathRequestStale,
    PathRequestForced,
    DuplicateFiltered,
    NavMeshTimeout,
    GuardedEntered,
}

impl TelemetryReason {
    pub const ALL: [TelemetryReason; 7] = [
        Self::PathRequestDeferred,
        Self::PathRequestDropped,
        Self::PathRequestStale,
        Self::PathRequestForced,
        Self::DuplicateFiltered,
        Self::NavMeshTimeout,
        Self::GuardedEntered,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::PathRequestDeferred => "path request deferred",
            Self::PathRequestDropped => "path request dropped",
            Self::PathRequestStale => "path request stale",
            Self::PathRequestForced => "path request forced",
            Self::DuplicateFiltered => "duplicate path request filtered",
            Self::NavMeshTimeout => "navmesh query timeout",
            Self::GuardedEntered => "guarded mode entered",
        }
    }
}

// ─── Sink ───────────────────────────────────────────────────────────────────

/// Optional counter sink. Components never branch on its presence.
pub trait ReasonSink {
    fn increment(&mut self, reason: TelemetryReason);
}

// ─── ReasonStats ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonStats {
    counts: BTreeMap<TelemetryReason, u64>,
}

impl ReasonStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, reason: TelemetryReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// The `n` most frequent reasons, highest first. Ties keep declaration order.
    pub fn top(&self, n: usize) -> Vec<(TelemetryReason, u64)> {
        let mut entries: Vec<(TelemetryReason, u64)> = self
            .counts
            .iter()
            .filter(|(_, &c)| c > 0)
            .map(|(&r, &c)| (r, c))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}

impl ReasonSink for ReasonStats {
    fn increment(&mut self, reason: TelemetryReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }
}

// ─── Shared handle ──────────────────────────────────────────────────────────

/// Shared single-threaded handle, so the host keeps reading counts after
/// giving a sink to the deferral queue.
#[derive(Debug, Clone, Default)]
pub struct SharedReasonStats(Rc<RefCell<ReasonStats>>);

impl SharedReasonStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ReasonStats {
        self.0.borrow().clone()
    }

    pub fn count(&self, reason: TelemetryReason) -> u64 {
        self.0.borrow().count(reason)
    }

    pub fn reset(&self) {
        self.0.borrow_mut().reset();
    }
}

impl ReasonSink for SharedReasonStats {
    fn increment(&mut self, reason: TelemetryReason) {
        self.0.borrow_mut().increment(reason);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_reason() {
        let mut stats = ReasonStats::new();
        stats.increment(TelemetryReason::PathRequestDropped);
        stats.increment(TelemetryReason::PathRequestDropped);
        stats.increment(TelemetryReason::NavMeshTimeout);
        assert_eq!(stats.count(TelemetryReason::PathRequestDropped), 2);
        assert_eq!(stats.count(TelemetryReason::NavMeshTimeout), 1);
        assert_eq!(stats.count(TelemetryReason::GuardedEntered), 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn top_is_sorted_descending() {
        let mut stats = ReasonStats::new();
        for _ in 0..3 {
            stats.increment(TelemetryReason::DuplicateFiltered);
        }
        stats.increment(TelemetryReason::PathRequestStale);
        for _ in 0..5 {
            stats.increment(TelemetryReason::PathRequestDeferred);
        }
        let top = stats.top(2);
        assert_eq!(
            top,
            vec![
                (TelemetryReason::PathRequestDeferred, 5),
                (TelemetryReason::DuplicateFiltered, 3),
            ]
        );
    }

    #[test]
    fn shared_handle_sees_increments_from_clone() {
        let shared = SharedReasonStats::new();
        let mut given_away: Box<dyn ReasonSink> = Box::new(shared.clone());
        given_away.increment(TelemetryReason::PathRequestDropped);
        assert_eq!(shared.count(TelemetryReason::PathRequestDropped), 1);
        shared.reset();
        assert_eq!(shared.snapshot().total(), 0);
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<&str> = TelemetryReason::ALL.iter().map(|r| r.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), TelemetryReason::ALL.len());
    }
}
