// Per-Tick Invariant Trackers - every bound the guard promises, audited per tick
// Every tick of every run is audited; a single violation fails the run

use pathfinding_governor::*;

// ─── Invariant Tracker ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InvariantTracker {
    max_consecutive_drops: u32,
    min_guarded_ticks: u64,

    pub budget_violations: u32,
    pub starvation_violations: u32,
    pub dwell_violations: u32,
    pub combat_refusals: u32,

    pub transitions: u32,
    pub guarded_ticks: u64,
    pub ever_guarded: bool,
    guarded_since: Option<u64>,
}

impl InvariantTracker {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            max_consecutive_drops: config.max_consecutive_drops,
            min_guarded_ticks: config.min_guarded_ticks,
            ..Self::default()
        }
    }

    /// Combat traffic may be filtered as a duplicate but never refused.
    pub fn record_admission(&mut self, ctx: &RequestContext, admission: Admission, combat: i32) {
        let is_combat = ctx.priority >= combat || ctx.in_combat;
        if is_combat && !admission.is_admitted() {
            self.combat_refusals += 1;
        }
    }

    pub fn record_tick(&mut self, result: &TickResult) {
        // Fresh work only spends what the drain left; the drain itself takes
        // at most one request beyond an empty budget.
        if result.admitted > result.budget.saturating_sub(result.drained)
            || result.drained > result.budget.max(1)
        {
            self.budget_violations += 1;
        }
        if result.longest_drop_streak > self.max_consecutive_drops {
            self.starvation_violations += 1;
        }

        if let Some(t) = result.transition {
            self.transitions += 1;
            match t.to {
                OverloadState::Guarded => {
                    self.ever_guarded = true;
                    self.guarded_since = Some(t.tick);
                }
                OverloadState::Normal => {
                    let entered = self.guarded_since.take().unwrap_or(0);
                    if t.tick.saturating_sub(entered) < self.min_guarded_ticks {
                        self.dwell_violations += 1;
                    }
                }
            }
        }

        if result.state == OverloadState::Guarded {
            self.guarded_ticks += 1;
        }
    }

    pub fn violations(&self) -> u32 {
        self.budget_violations
            + self.starvation_violations
            + self.dwell_violations
            + self.combat_refusals
    }
}

// ─── Request Conservation ───────────────────────────────────────────────────

/// Every request that missed the budget is accounted for exactly once:
/// dropped (capacity or stale), forced, drained, or still queued.
pub fn requests_conserved(status: &GuardStatus) -> bool {
    status.deferred_requests
        == status.queue_dropped
            + status.queue_forced
            + status.queue_processed
            + status.queue_len as u64
}
