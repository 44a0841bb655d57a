// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor

pub mod types;
pub mod config;
pub mod telemetry;
pub mod defer_queue;
pub mod governor;
pub mod panic_protocol;

// Reference collaborators and the integrated per-tick facade
pub mod dedup;
pub mod navmesh;
pub mod guard;
pub mod simulation;

pub use types::*;
pub use config::{ConfigError, GuardConfig};
pub use defer_queue::{DeferQueue, DrainReport};
pub use governor::{BudgetGovernor, GovernorCounters};
pub use panic_protocol::{MatchingControl, PanicProtocol, SafetySignals, TimeoutSignal};
pub use telemetry::{ReasonSink, ReasonStats, SharedReasonStats, TelemetryReason};
pub use dedup::DuplicateRequestFilter;
pub use navmesh::{GuardedResult, NavMeshQueryGuard, QueryStatus};
pub use guard::PathfindingGuard;
pub use simulation::GuardSimulation;

use wasm_bindgen::prelude::*;

// ─── WASM Interface ─────────────────────────────────────────────────────────

#[wasm_bindgen]
impl GuardSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(budget_per_tick: u32, max_queue_size: u32) -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        // A zero ceiling reports overflow on every tick.
        let max_queue_size = max_queue_size.max(1) as usize;
        Self::with_config(GuardConfig::with_limits(budget_per_tick, max_queue_size))
    }

    pub fn tick(&mut self) -> JsValue {
        let result = self.tick_core();
        serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
    }

    /// Offer a request to the open tick. Returns `Admission::code`.
    pub fn offer_request(
        &mut self,
        actor_id: u32,
        priority: i32,
        in_combat: bool,
        distance_sq: f64,
        target_x: f64,
        target_y: f64,
    ) -> u8 {
        let ctx = RequestContext::new(actor_id, priority, distance_sq)
            .with_target(target_x, target_y)
            .in_combat(in_combat);
        self.offer(&ctx).code()
    }

    /// Host-timed nav-mesh query. Returns 0 success, 1 warning, 2 timeout.
    pub fn report_query_time(&mut self, elapsed_ms: u32) -> u8 {
        match self.inject_navmesh_query(elapsed_ms as u64) {
            QueryStatus::Success => 0,
            QueryStatus::Warning => 1,
            QueryStatus::Timeout => 2,
        }
    }

    pub fn get_status(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.status()).unwrap_or(JsValue::NULL)
    }

    /// Saturates at `u32::MAX`.
    pub fn get_current_tick(&self) -> u32 {
        u32::try_from(self.current_tick).unwrap_or(u32::MAX)
    }

    pub fn get_queue_len(&self) -> u32 {
        u32::try_from(self.guard.governor().queue().len()).unwrap_or(u32::MAX)
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.state() == OverloadState::Guarded
    }

    pub fn set_budget_per_tick(&mut self, budget: u32) {
        self.guard.set_budget_per_tick(budget);
    }

    /// Returns false, leaving the ceiling unchanged, for a size of zero.
    pub fn set_max_queue_size(&mut self, size: u32) -> bool {
        self.guard.set_max_queue_size(size as usize).is_ok()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.guard.set_enabled(enabled);
    }

    /// Returns true when the call left GUARDED.
    pub fn force_reset(&mut self) -> bool {
        self.guard.force_reset().is_some()
    }

    /// Run N empty ticks without returning results
    pub fn run_batch(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick_core();
        }
    }

    /// Reset simulation to initial state, keeping the current limits
    pub fn reset(&mut self) {
        *self = GuardSimulation::with_config(self.guard.config().clone());
    }
}
