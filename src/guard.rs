// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Integrated Guard
//
// Wires the budget governor, deferral queue and panic protocol to the
// duplicate filter and nav-mesh guard, and drives them through one tick:
//
//   on_tick_start: safety check -> dedup reset -> budget reset + drain
//   check_path_request (0..n): duplicate? -> governor admission
//   on_tick_end: per-tick cleanup
//
// Single-threaded by contract. A host that offers requests from another
// thread must serialize every call through one owner.

use tracing::info;

use crate::config::{ConfigError, GuardConfig};
use crate::dedup::DuplicateRequestFilter;
use crate::governor::BudgetGovernor;
use crate::navmesh::{NavMeshQueryGuard, QueryStatus};
use crate::panic_protocol::{PanicProtocol, TimeoutSignal};
use crate::telemetry::{ReasonSink, TelemetryReason};
use crate::types::{Admission, GuardStatus, OverloadState, RequestContext, TickStart, Transition};

#[derive(Debug)]
pub struct PathfindingGuard {
    config: GuardConfig,
    governor: BudgetGovernor,
    dedup: DuplicateRequestFilter,
    navmesh: NavMeshQueryGuard,
    protocol: PanicProtocol,
    enabled: bool,
}

impl PathfindingGuard {
    pub fn new(config: GuardConfig) -> Self {
        let governor = BudgetGovernor::new(&config);
        Self::assemble(config, governor)
    }

    /// Validate `config` before building the guard.
    pub fn try_new(config: GuardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn with_sink(config: GuardConfig, sink: Box<dyn ReasonSink>) -> Self {
        let governor = BudgetGovernor::with_sink(&config, sink);
        Self::assemble(config, governor)
    }

    fn assemble(config: GuardConfig, governor: BudgetGovernor) -> Self {
        let guard = Self {
            dedup: DuplicateRequestFilter::new(),
            navmesh: NavMeshQueryGuard::new(&config),
            protocol: PanicProtocol::new(&config),
            governor,
            config,
            enabled: true,
        };
        info!(
            budget = guard.config.budget_per_tick,
            max_queue = guard.config.max_queue_size,
            "pathfinding guard initialized"
        );
        guard
    }

    // ─── Tick lifecycle ─────────────────────────────────────────────────────

    pub fn on_tick_start(&mut self, tick: u64) -> TickStart {
        if !self.enabled {
            return TickStart { tick, ..TickStart::default() };
        }

        let transition = self.protocol.check_safety_events(
            tick,
            &mut self.governor,
            &self.navmesh,
            &mut self.dedup,
        );
        if transition.map(|t| t.to) == Some(OverloadState::Guarded) {
            self.governor.queue_mut().emit(TelemetryReason::GuardedEntered);
        }
        self.dedup.on_tick_start(tick);
        let report = self.governor.begin_tick(tick);

        TickStart {
            tick,
            transition,
            drained: report.drained,
            stale_evicted: report.stale,
            budget: self.governor.tick_budget(),
            remaining_budget: self.governor.remaining_budget(),
        }
    }

    pub fn check_path_request(&mut self, ctx: &RequestContext) -> Admission {
        if !self.enabled {
            return Admission::Passthrough;
        }
        if self.dedup.is_duplicate(ctx.actor_id, ctx.target_x, ctx.target_y) {
            self.governor.queue_mut().emit(TelemetryReason::DuplicateFiltered);
            return Admission::Duplicate;
        }
        self.governor.admit(ctx)
    }

    pub fn on_tick_end(&mut self, _tick: u64) {
        if !self.enabled {
            return;
        }
        self.dedup.on_tick_end();
        self.governor.queue_mut().on_tick_end();
    }

    pub fn record_navmesh_query(&mut self, elapsed_ms: u64) -> QueryStatus {
        let status = self.navmesh.record_query(elapsed_ms);
        if status == QueryStatus::Timeout {
            self.governor.queue_mut().emit(TelemetryReason::NavMeshTimeout);
        }
        status
    }

    // ─── Control ────────────────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_budget_per_tick(&mut self, budget: u32) {
        self.config.budget_per_tick = budget;
        self.governor.set_budget_per_tick(budget);
    }

    /// A zero ceiling would report overflow forever; it is refused and the
    /// current ceiling kept.
    pub fn set_max_queue_size(&mut self, size: usize) -> Result<(), ConfigError> {
        if size == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        self.config.max_queue_size = size;
        self.governor.queue_mut().set_max_queue_size(size);
        Ok(())
    }

    pub fn force_reset(&mut self) -> Option<Transition> {
        let tick = self.governor.current_tick();
        self.protocol.force_reset(tick, &mut self.governor, &mut self.dedup)
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn governor(&self) -> &BudgetGovernor {
        &self.governor
    }

    pub fn duplicate_filter(&self) -> &DuplicateRequestFilter {
        &self.dedup
    }

    pub fn navmesh_guard(&self) -> &NavMeshQueryGuard {
        &self.navmesh
    }

    pub fn panic_protocol(&self) -> &PanicProtocol {
        &self.protocol
    }

    pub fn state(&self) -> OverloadState {
        self.protocol.state()
    }

    pub fn status(&self) -> GuardStatus {
        let queue = self.governor.queue();
        GuardStatus {
            enabled: self.enabled,
            current_tick: self.governor.current_tick(),
            state: self.protocol.state(),
            guarded_duration_ticks: self.protocol.guarded_duration_ticks(),
            budget_per_tick: self.governor.budget_per_tick(),
            remaining_budget: self.governor.remaining_budget(),
            conservative_mode: self.governor.is_conservative(),
            total_requests: self.governor.total_requests(),
            deferred_requests: self.governor.deferred_requests(),
            combat_bypass_count: self.governor.combat_bypass_count(),
            queue_len: queue.len(),
            queue_dropped: queue.dropped_count(),
            queue_forced: queue.forced_count(),
            queue_processed: queue.processed_count(),
            queue_stale: queue.stale_count(),
            duplicates_filtered: self.dedup.duplicates_filtered(),
            stricter_matching: self.dedup.is_stricter(),
            consecutive_timeouts: self.navmesh.consecutive_timeouts(),
            total_timeouts: self.navmesh.total_timeouts(),
            total_warnings: self.navmesh.total_warnings(),
        }
    }

    /// Log the periodic summary, then open a fresh telemetry window.
    /// Queue counters and the overload state are lifetime values and stay.
    pub fn log_status_summary(&mut self) -> GuardStatus {
        let status = self.status();
        info!(
            state = status.state.label(),
            total_requests = status.total_requests,
            deferred = status.deferred_requests,
            combat_bypass = status.combat_bypass_count,
            queue_len = status.queue_len,
            dropped = status.queue_dropped,
            forced = status.queue_forced,
            duplicates = status.duplicates_filtered,
            timeouts = status.total_timeouts,
            "pathfinding guard status"
        );

        self.governor.reset_telemetry();
        self.dedup.reset_telemetry();
        self.navmesh.reset_telemetry();
        status
    }
}

impl Default for PathfindingGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PRIORITY_CHASE, PRIORITY_COMBAT};

    fn ctx(actor: u32, x: f64) -> RequestContext {
        RequestContext::new(actor, PRIORITY_CHASE, 900.0).with_target(x, 0.0)
    }

    #[test]
    fn duplicate_in_same_tick_is_treated_as_handled() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(5, 10));
        g.on_tick_start(1);
        assert_eq!(g.check_path_request(&ctx(1, 4.0)), Admission::Admitted);
        assert_eq!(g.check_path_request(&ctx(1, 4.2)), Admission::Duplicate);
        assert_eq!(g.governor().remaining_budget(), 4);
        g.on_tick_end(1);
        g.on_tick_start(2);
        assert_eq!(g.check_path_request(&ctx(1, 4.0)), Admission::Admitted);
    }

    #[test]
    fn disabled_guard_passes_everything() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(0, 10));
        g.set_enabled(false);
        g.on_tick_start(1);
        for actor in 0..10 {
            assert_eq!(g.check_path_request(&ctx(actor, 1.0)), Admission::Passthrough);
        }
        assert_eq!(g.governor().total_requests(), 0);
    }

    #[test]
    fn timeout_streak_degrades_next_tick() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(10, 10));
        g.on_tick_start(1);
        for _ in 0..3 {
            g.record_navmesh_query(250);
        }
        g.on_tick_end(1);

        let start = g.on_tick_start(2);
        assert_eq!(start.transition.map(|t| t.to), Some(OverloadState::Guarded));
        assert_eq!(start.budget, 5);
        assert_eq!(start.remaining_budget, 5);
        assert!(g.duplicate_filter().is_stricter());
    }

    #[test]
    fn force_reset_restores_full_budget_next_tick() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(10, 10));
        for _ in 0..3 {
            g.record_navmesh_query(250);
        }
        g.on_tick_start(1);
        assert_eq!(g.state(), OverloadState::Guarded);
        assert!(g.force_reset().is_some());
        assert_eq!(g.state(), OverloadState::Normal);
        g.record_navmesh_query(5);
        assert_eq!(g.on_tick_start(2).budget, 10);
    }

    #[test]
    fn status_summary_resets_window_counters() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(1, 10));
        g.on_tick_start(1);
        g.check_path_request(&ctx(1, 1.0));
        g.check_path_request(&ctx(2, 1.0));
        g.check_path_request(&RequestContext::new(3, PRIORITY_COMBAT, 0.0));

        let status = g.log_status_summary();
        assert_eq!(status.total_requests, 3);
        assert_eq!(status.deferred_requests, 1);
        assert_eq!(status.combat_bypass_count, 1);
        assert_eq!(status.queue_len, 1);

        let after = g.status();
        assert_eq!(after.total_requests, 0);
        assert_eq!(after.queue_len, 1);
    }

    #[test]
    fn sink_sees_every_reason_the_guard_emits() {
        use crate::telemetry::SharedReasonStats;

        let stats = SharedReasonStats::new();
        let mut g = PathfindingGuard::with_sink(
            GuardConfig::with_limits(0, 2),
            Box::new(stats.clone()),
        );
        g.on_tick_start(1);
        g.check_path_request(&ctx(1, 1.0));
        g.check_path_request(&ctx(1, 1.0));
        for _ in 0..3 {
            g.record_navmesh_query(500);
        }
        g.on_tick_end(1);
        g.on_tick_start(2);

        assert_eq!(stats.count(TelemetryReason::PathRequestDeferred), 1);
        assert_eq!(stats.count(TelemetryReason::DuplicateFiltered), 1);
        assert_eq!(stats.count(TelemetryReason::NavMeshTimeout), 3);
        assert_eq!(stats.count(TelemetryReason::GuardedEntered), 1);
    }

    #[test]
    fn zero_queue_ceiling_is_refused_at_runtime() {
        let mut g = PathfindingGuard::new(GuardConfig::with_limits(10, 10));
        assert!(matches!(g.set_max_queue_size(0), Err(ConfigError::EmptyQueue)));
        assert_eq!(g.config().max_queue_size, 10);
        assert_eq!(g.governor().queue().max_queue_size(), 10);

        g.on_tick_start(1);
        assert_eq!(g.state(), OverloadState::Normal);
        assert!(g.set_max_queue_size(4).is_ok());
        assert_eq!(g.governor().queue().max_queue_size(), 4);
    }

    #[test]
    fn try_new_rejects_invalid_config() {
        assert!(PathfindingGuard::try_new(GuardConfig::with_limits(10, 0)).is_err());
        assert!(PathfindingGuard::try_new(GuardConfig::default()).is_ok());
    }
}
