// Scenario Definitions - load shapes the admission guard must survive
// All scenario logic lives in curve functions; the library is never patched

use pathfinding_governor::GuardConfig;

use crate::traffic::TrafficMix;

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub budget: u32,
    pub max_queue: usize,
    pub actors: u32,
    pub ticks: u64,
    /// Expected requests per tick when no curve is given.
    pub lambda: f64,
    pub mix: TrafficMix,
    pub lambda_curve: Option<fn(u64) -> f64>,
    /// Nav-mesh query time (ms) reported during a tick, if any.
    pub query_curve: Option<fn(u64) -> Option<u64>>,
    pub criteria: PassCriteria,
}

impl Scenario {
    pub fn config(&self) -> GuardConfig {
        GuardConfig::with_limits(self.budget, self.max_queue)
    }

    pub fn lambda_at(&self, tick: u64) -> f64 {
        self.lambda_curve.map_or(self.lambda, |curve| curve(tick))
    }

    pub fn query_at(&self, tick: u64) -> Option<u64> {
        self.query_curve.and_then(|curve| curve(tick))
    }
}

/// Scenario-specific expectations. The per-tick invariants (budget bound,
/// starvation bound, dwell bound, combat bypass, request conservation) are
/// checked for every scenario regardless.
#[derive(Default)]
pub struct PassCriteria {
    pub require_guarded: bool,
    pub require_recovered: bool,
    pub require_forced: bool,
    pub max_transitions: Option<u32>,
    pub max_drop_rate: Option<f64>,
    pub min_service_rate: Option<f64>,
}

// ─── Curve Functions ────────────────────────────────────────────────────────

fn surge_lambda(tick: u64) -> f64 {
    if (100..300).contains(&tick) { 150.0 } else { 30.0 }
}

fn diurnal_lambda(tick: u64) -> f64 {
    35.0 + 20.0 * (tick as f64 / 60.0).sin()
}

fn timeout_storm_queries(tick: u64) -> Option<u64> {
    if (200..230).contains(&tick) { Some(150) } else { Some(20) }
}

/// Three timeouts then a fast query, every ten ticks.
fn flapping_queries(tick: u64) -> Option<u64> {
    match tick % 10 {
        0..=2 => Some(150),
        3 => Some(10),
        _ => None,
    }
}

fn slow_but_alive_queries(tick: u64) -> Option<u64> {
    Some(if tick % 2 == 0 { 80 } else { 95 })
}

// ─── Scenario Definitions ───────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        // ─── Load (3) ───────────────────────────────────────────────────
        Scenario { name: "STEADY_STATE", label: "Steady State", category: "load",
            budget: 50, max_queue: 200, actors: 400, ticks: 600, lambda: 30.0,
            mix: TrafficMix::default(), lambda_curve: None, query_curve: None,
            criteria: PassCriteria {
                max_transitions: Some(0),
                max_drop_rate: Some(0.5),
                min_service_rate: Some(99.0),
                ..Default::default()
            } },
        Scenario { name: "DIURNAL", label: "Diurnal Swell", category: "load",
            budget: 50, max_queue: 200, actors: 400, ticks: 720, lambda: 35.0,
            mix: TrafficMix::default(), lambda_curve: Some(diurnal_lambda), query_curve: None,
            criteria: PassCriteria { max_transitions: Some(0), ..Default::default() } },
        Scenario { name: "SURGE", label: "Crowd Surge", category: "load",
            budget: 50, max_queue: 200, actors: 1500, ticks: 600, lambda: 30.0,
            mix: TrafficMix::default(), lambda_curve: Some(surge_lambda), query_curve: None,
            criteria: PassCriteria {
                require_guarded: true,
                require_recovered: true,
                ..Default::default()
            } },

        // ─── Nav-mesh (3) ───────────────────────────────────────────────
        Scenario { name: "TIMEOUT_STORM", label: "Nav-Mesh Timeout Storm", category: "navmesh",
            budget: 50, max_queue: 200, actors: 400, ticks: 500, lambda: 30.0,
            mix: TrafficMix::default(), lambda_curve: None,
            query_curve: Some(timeout_storm_queries),
            criteria: PassCriteria {
                require_guarded: true,
                require_recovered: true,
                max_transitions: Some(2),
                ..Default::default()
            } },
        Scenario { name: "FLAPPING_SIGNAL", label: "Flapping Timeout Signal", category: "navmesh",
            budget: 50, max_queue: 200, actors: 400, ticks: 600, lambda: 20.0,
            mix: TrafficMix::default(), lambda_curve: None, query_curve: Some(flapping_queries),
            criteria: PassCriteria {
                require_guarded: true,
                max_transitions: Some(10),
                ..Default::default()
            } },
        Scenario { name: "SLOW_NOT_DEAD", label: "Slow But Alive Nav-Mesh", category: "navmesh",
            budget: 50, max_queue: 200, actors: 400, ticks: 400, lambda: 30.0,
            mix: TrafficMix::default(), lambda_curve: None,
            query_curve: Some(slow_but_alive_queries),
            criteria: PassCriteria { max_transitions: Some(0), ..Default::default() } },

        // ─── Fairness (2) ───────────────────────────────────────────────
        Scenario { name: "STARVATION_SIEGE", label: "Starvation Siege", category: "fairness",
            budget: 4, max_queue: 20, actors: 8, ticks: 300, lambda: 40.0,
            mix: TrafficMix::new(1.0, 0.0, 0.0, 1.0), lambda_curve: None, query_curve: None,
            criteria: PassCriteria {
                require_guarded: true,
                require_forced: true,
                ..Default::default()
            } },
        Scenario { name: "COMBAT_FLOOD", label: "Combat Flood", category: "fairness",
            budget: 10, max_queue: 200, actors: 600, ticks: 300, lambda: 60.0,
            mix: TrafficMix { in_combat_share: 0.2, ..TrafficMix::new(0.2, 0.2, 0.6, 0.3) },
            lambda_curve: None, query_curve: None,
            criteria: PassCriteria::default() },
    ]
}
