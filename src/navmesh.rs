// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Nav-Mesh Query Guard
//
// Times nav-mesh queries and keeps a consecutive-timeout streak that the
// panic protocol reads as an overload signal. A timeout is a silent fail:
// the caller gets no result, never a panic or an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::panic_protocol::TimeoutSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Success,
    /// Slower than the warning threshold; result still used.
    Warning,
    /// Slower than the timeout threshold; result discarded.
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardedResult<T> {
    pub value: Option<T>,
    pub status: QueryStatus,
    pub elapsed_ms: u64,
}

impl<T> GuardedResult<T> {
    pub fn is_timeout(&self) -> bool {
        self.status == QueryStatus::Timeout
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavMeshQueryGuard {
    warning_ms: u64,
    timeout_ms: u64,
    consecutive_timeouts: u32,
    total_timeouts: u64,
    total_warnings: u64,
}

impl NavMeshQueryGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            warning_ms: config.navmesh_warning_ms,
            timeout_ms: config.navmesh_timeout_ms,
            consecutive_timeouts: 0,
            total_timeouts: 0,
            total_warnings: 0,
        }
    }

    /// Classify a finished query. Any non-timeout breaks the streak.
    pub fn record_query(&mut self, elapsed_ms: u64) -> QueryStatus {
        if elapsed_ms > self.timeout_ms {
            self.consecutive_timeouts += 1;
            self.total_timeouts += 1;
            warn!(elapsed_ms, streak = self.consecutive_timeouts, "navmesh query timeout");
            return QueryStatus::Timeout;
        }

        self.consecutive_timeouts = 0;

        if elapsed_ms > self.warning_ms {
            self.total_warnings += 1;
            debug!(elapsed_ms, "navmesh query slow");
            return QueryStatus::Warning;
        }
        QueryStatus::Success
    }

    /// Run and time `computation`. `std::time::Instant` is unavailable on
    /// wasm32, where hosts call `record_query` with their own timings.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn guard<T, F: FnOnce() -> T>(&mut self, computation: F) -> GuardedResult<T> {
        let start = std::time::Instant::now();
        let value = computation();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = self.record_query(elapsed_ms);
        GuardedResult {
            value: (status != QueryStatus::Timeout).then_some(value),
            status,
            elapsed_ms,
        }
    }

    pub fn total_timeouts(&self) -> u64 {
        self.total_timeouts
    }

    pub fn total_warnings(&self) -> u64 {
        self.total_warnings
    }

    pub fn reset_telemetry(&mut self) {
        self.consecutive_timeouts = 0;
        self.total_timeouts = 0;
        self.total_warnings = 0;
    }
}

impl TimeoutSignal for NavMeshQueryGuard {
    fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }
}
