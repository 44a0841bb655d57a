// Benchmark Report Types
// Structured output for independent analysis of admission behaviour

use serde::Serialize;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: String,
    pub name: String,
    pub category: String,
    pub seed: u64,
    pub pass: bool,
    pub ticks: u64,
    pub offered: u64,
    pub admitted: u64,
    pub combat_bypass: u64,
    pub forced: u64,
    pub deferred: u64,
    pub dropped: u64,
    pub duplicates: u64,
    pub drained: u64,
    pub stale_evicted: u64,
    /// Percent of offered requests that searched in the tick offered or later.
    pub service_rate: f64,
    /// Percent of offered requests refused at the queue ceiling.
    pub drop_rate: f64,
    /// Mean share of each tick's budget spent, in percent.
    pub budget_utilization: f64,
    pub peak_queue: usize,
    pub mean_queue: f64,
    pub transitions: u32,
    pub guarded_ticks: u64,
    pub final_state: &'static str,
    pub budget_violations: u32,
    pub starvation_violations: u32,
    pub dwell_violations: u32,
    pub combat_refusals: u32,
    pub requests_conserved: bool,
    pub elapsed_ms: u128,
    pub throughput_per_sec: f64,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub category: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    pub service_rate: Stats,
    pub drop_rate: Stats,
    pub budget_utilization: Stats,
    pub peak_queue: Stats,
    pub mean_queue: Stats,
    pub transitions: Stats,
    pub guarded_ticks: Stats,
    pub forced: Stats,
    pub elapsed_ms: Stats,
    pub throughput_per_sec: Stats,
    pub individual_runs: Vec<BenchResult>,
}

// ─── Invariant Summary ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct InvariantSummary {
    pub budget_bound: bool,
    pub starvation_bound: bool,
    pub dwell_bound: bool,
    pub combat_bypass: bool,
    pub request_conservation: bool,
}

impl InvariantSummary {
    pub fn from_reports(reports: &[MonteCarloReport]) -> Self {
        let runs = || reports.iter().flat_map(|r| r.individual_runs.iter());
        Self {
            budget_bound: runs().all(|r| r.budget_violations == 0),
            starvation_bound: runs().all(|r| r.starvation_violations == 0),
            dwell_bound: runs().all(|r| r.dwell_violations == 0),
            combat_bypass: runs().all(|r| r.combat_refusals == 0),
            request_conservation: runs().all(|r| r.requests_conserved),
        }
    }

    pub fn all_hold(&self) -> bool {
        self.budget_bound
            && self.starvation_bound
            && self.dwell_bound
            && self.combat_bypass
            && self.request_conservation
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub summary: Summary,
    pub invariants: InvariantSummary,
    pub scenarios: Vec<MonteCarloReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}
