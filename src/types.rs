// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Pathfinding Admission Governor - Type Definitions

use serde::{Serialize, Deserialize};

// ─── Path Request ───────────────────────────────────────────────────────────

/// One pending search, frozen at the moment it missed the tick budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub actor_id: u32,
    pub priority: i32,
    pub distance_sq: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub origin_tick: u64,
}

impl PathRequest {
    pub fn new(
        actor_id: u32,
        priority: i32,
        distance_sq: f64,
        target_x: f64,
        target_y: f64,
        origin_tick: u64,
    ) -> Self {
        Self { actor_id, priority, distance_sq, target_x, target_y, origin_tick }
    }

    /// Ticks elapsed since the request was deferred.
    pub fn age_at(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.origin_tick)
    }
}

// ─── Request Context ────────────────────────────────────────────────────────

/// What the simulation knows about a search at the moment it is offered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor_id: u32,
    pub priority: i32,
    pub in_combat: bool,
    pub distance_sq: f64,
    pub target_x: f64,
    pub target_y: f64,
}

impl RequestContext {
    pub fn new(actor_id: u32, priority: i32, distance_sq: f64) -> Self {
        Self {
            actor_id,
            priority,
            in_combat: false,
            distance_sq,
            target_x: 0.0,
            target_y: 0.0,
        }
    }

    pub fn with_target(mut self, x: f64, y: f64) -> Self {
        self.target_x = x;
        self.target_y = y;
        self
    }

    pub fn in_combat(mut self, in_combat: bool) -> Self {
        self.in_combat = in_combat;
        self
    }

    /// Freeze the context into a deferrable request tagged with `tick`.
    pub fn to_request(&self, tick: u64) -> PathRequest {
        PathRequest::new(
            self.actor_id,
            self.priority,
            self.distance_sq,
            self.target_x,
            self.target_y,
            tick,
        )
    }
}

// ─── Admission ──────────────────────────────────────────────────────────────

/// Outcome of offering a request. The caller applies side effects
/// (start the search, mark the actor as waiting) based on this value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Admission {
    /// Admitted against this tick's budget.
    Admitted = 0,
    /// Combat priority or in-combat flag: admitted regardless of budget.
    CombatBypass = 1,
    /// Starved actor: admitted past both the queue and the budget.
    Forced = 2,
    /// Budget exhausted: held in the deferral queue.
    Deferred = 3,
    /// Budget exhausted and the queue refused low-value traffic.
    Dropped = 4,
    /// Same actor and target already searched this tick.
    Duplicate = 5,
    /// Guard disabled: every request passes untouched.
    Passthrough = 6,
}

impl Admission {
    /// Whether the search may proceed this tick.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Deferred | Self::Dropped)
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Admitted => "ADMITTED",
            Self::CombatBypass => "COMBAT_BYPASS",
            Self::Forced => "FORCED",
            Self::Deferred => "DEFERRED",
            Self::Dropped => "DROPPED",
            Self::Duplicate => "DUPLICATE",
            Self::Passthrough => "PASSTHROUGH",
        }
    }
}

/// What the deferral queue did with a request handed to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    Dropped,
    Forced,
}

// ─── Overload State ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OverloadState {
    #[default]
    Normal = 0,
    Guarded = 1,
}

impl OverloadState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Guarded => "GUARDED",
        }
    }
}

/// A state change reported by the overload protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transition {
    pub from: OverloadState,
    pub to: OverloadState,
    pub tick: u64,
}

// ─── Tick Start ─────────────────────────────────────────────────────────────

/// Result of opening a tick: the deferred work drained against the fresh
/// budget, and any overload transition evaluated before it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickStart {
    pub tick: u64,
    pub transition: Option<Transition>,
    pub drained: Vec<PathRequest>,
    pub stale_evicted: u32,
    pub budget: u32,
    pub remaining_budget: u32,
}

// ─── TickResult ─────────────────────────────────────────────────────────────

/// Per-tick accounting produced by the simulation harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickResult {
    pub tick: u64,
    pub state: OverloadState,
    pub budget: u32,
    pub offered: u32,
    pub admitted: u32,
    pub combat_bypass: u32,
    pub forced: u32,
    pub deferred: u32,
    pub dropped: u32,
    pub duplicates: u32,
    pub drained: u32,
    pub stale_evicted: u32,
    /// Non-bypass admissions plus drained requests charged to the budget.
    pub budget_spent: u32,
    pub queue_len: usize,
    pub remaining_budget: u32,
    /// Longest outstanding per-actor drop streak at tick close.
    pub longest_drop_streak: u32,
    pub consecutive_timeouts: u32,
    pub guarded_duration_ticks: u64,
    pub transition: Option<Transition>,
}

// ─── GuardStatus ────────────────────────────────────────────────────────────

/// Read-only snapshot of every counter the guard exposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardStatus {
    pub enabled: bool,
    pub current_tick: u64,
    pub state: OverloadState,
    pub guarded_duration_ticks: u64,
    pub budget_per_tick: u32,
    pub remaining_budget: u32,
    pub conservative_mode: bool,
    pub total_requests: u64,
    pub deferred_requests: u64,
    pub combat_bypass_count: u64,
    pub queue_len: usize,
    pub queue_dropped: u64,
    pub queue_forced: u64,
    pub queue_processed: u64,
    pub queue_stale: u64,
    pub duplicates_filtered: u64,
    pub stricter_matching: bool,
    pub consecutive_timeouts: u32,
    pub total_timeouts: u64,
    pub total_warnings: u64,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
