// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Configuration
//
// Every threshold the governor, deferral queue and overload protocol consult
// lives here. Components take a `GuardConfig` by value at construction, so
// tests can vary thresholds without process-wide state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Defaults ───────────────────────────────────────────────────────────────

pub const DEFAULT_BUDGET_PER_TICK: u32 = 50;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 200;
pub const DEFAULT_MAX_CONSECUTIVE_DROPS: u32 = 3;

/// Engine priority: wandering (lowest).
pub const PRIORITY_WANDER: i32 = 0;
/// Engine priority: chasing a target.
pub const PRIORITY_CHASE: i32 = 1;
/// Engine priority: combat (highest, always admitted).
pub const PRIORITY_COMBAT: i32 = 2;

/// 20 tiles, squared.
pub const NEAR_DIST_SQ: f64 = 20.0 * 20.0;
/// 40 tiles, squared.
pub const MEDIUM_DIST_SQ: f64 = 40.0 * 40.0;
/// 80 tiles, squared. Drop candidates live beyond this.
pub const FAR_DIST_SQ: f64 = 80.0 * 80.0;

pub const STALE_AGE_TICKS: u64 = 2;
/// 120 ticks, two seconds at 60 Hz.
pub const MIN_GUARDED_TICKS: u64 = 120;
pub const CONSECUTIVE_TIMEOUT_TRIGGER: u32 = 3;

pub const NAVMESH_WARNING_MS: u64 = 50;
pub const NAVMESH_TIMEOUT_MS: u64 = 100;

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_queue_size must be at least 1")]
    EmptyQueue,

    #[error("max_consecutive_drops must be at least 1")]
    ZeroDropThreshold,

    #[error("overflow_ratio {0} is outside (0.0, 1.0]")]
    OverflowRatioOutOfRange(f64),

    #[error("distance threshold '{field}' must be a non-negative number, got {value}")]
    InvalidDistance { field: &'static str, value: f64 },

    #[error("combat priority {combat} must be above wander priority {wander}")]
    PriorityOrder { wander: i32, combat: i32 },

    #[error("navmesh warning threshold {warning_ms}ms exceeds timeout threshold {timeout_ms}ms")]
    NavMeshThresholds { warning_ms: u64, timeout_ms: u64 },

    #[error("failed to parse guard config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ─── GuardConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Nominal searches admitted per tick (halved in conservative mode).
    pub budget_per_tick: u32,
    /// Soft ceiling on the deferral queue. Only enforced against
    /// wander-priority, far-distance traffic.
    pub max_queue_size: usize,
    /// Fraction of `max_queue_size` at which the queue reports overflowing.
    pub overflow_ratio: f64,
    pub near_distance_sq: f64,
    pub far_distance_sq: f64,
    pub wander_priority: i32,
    pub combat_priority: i32,
    /// Consecutive capacity drops after which an actor is force-processed.
    pub max_consecutive_drops: u32,
    /// Deferred requests older than this many ticks are evicted unprocessed.
    pub stale_age_ticks: u64,
    /// Minimum dwell in GUARDED before recovery is considered.
    pub min_guarded_ticks: u64,
    /// Consecutive nav-mesh timeouts that trigger GUARDED.
    pub timeout_trigger: u32,
    pub navmesh_warning_ms: u64,
    pub navmesh_timeout_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            budget_per_tick: DEFAULT_BUDGET_PER_TICK,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            overflow_ratio: 0.9,
            near_distance_sq: NEAR_DIST_SQ,
            far_distance_sq: FAR_DIST_SQ,
            wander_priority: PRIORITY_WANDER,
            combat_priority: PRIORITY_COMBAT,
            max_consecutive_drops: DEFAULT_MAX_CONSECUTIVE_DROPS,
            stale_age_ticks: STALE_AGE_TICKS,
            min_guarded_ticks: MIN_GUARDED_TICKS,
            timeout_trigger: CONSECUTIVE_TIMEOUT_TRIGGER,
            navmesh_warning_ms: NAVMESH_WARNING_MS,
            navmesh_timeout_ms: NAVMESH_TIMEOUT_MS,
        }
    }
}

impl GuardConfig {
    /// Default thresholds with a custom budget and queue ceiling.
    pub fn with_limits(budget_per_tick: u32, max_queue_size: usize) -> Self {
        Self {
            budget_per_tick,
            max_queue_size,
            ..Self::default()
        }
    }

    /// Parse a JSON document, filling missing fields with defaults, and
    /// validate the result.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GuardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        if self.max_consecutive_drops == 0 {
            return Err(ConfigError::ZeroDropThreshold);
        }
        if !(self.overflow_ratio > 0.0 && self.overflow_ratio <= 1.0) {
            return Err(ConfigError::OverflowRatioOutOfRange(self.overflow_ratio));
        }
        for (field, value) in [
            ("near_distance_sq", self.near_distance_sq),
            ("far_distance_sq", self.far_distance_sq),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::InvalidDistance { field, value });
            }
        }
        if self.combat_priority <= self.wander_priority {
            return Err(ConfigError::PriorityOrder {
                wander: self.wander_priority,
                combat: self.combat_priority,
            });
        }
        if self.navmesh_warning_ms > self.navmesh_timeout_ms {
            return Err(ConfigError::NavMeshThresholds {
                warning_ms: self.navmesh_warning_ms,
                timeout_ms: self.navmesh_timeout_ms,
            });
        }
        Ok(())
    }

    /// Budget granted per tick while conservative mode is active.
    pub fn conservative_budget(&self) -> u32 {
        halve(self.budget_per_tick)
    }

    /// Queue length at or above which the queue reports overflowing.
    pub fn overflow_threshold(&self) -> f64 {
        self.max_queue_size as f64 * self.overflow_ratio
    }

    /// Deferred requests drained per tick for a nominal budget, once the
    /// first fresh head has been taken.
    pub fn drain_limit(budget_per_tick: u32) -> u32 {
        halve(budget_per_tick)
    }
}

/// `floor(n * 0.5)`.
pub(crate) fn halve(n: u32) -> u32 {
    n / 2
}

// ─── Tests ──────────────────────────────────────────────────────────────────
