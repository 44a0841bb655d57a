// Monte Carlo Infrastructure - N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N, computing mean ± 95% CI

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use pathfinding_governor::*;
use tracing::{debug, warn};

use crate::metrics::{requests_conserved, InvariantTracker};
use crate::report::*;
use crate::scenarios::Scenario;
use crate::time_series::TimeSeriesRecorder;
use crate::traffic::TrafficGenerator;

use std::time::Instant;

/// Run a single scenario iteration with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    seed: u64,
    time_series_dir: Option<&std::path::Path>,
) -> BenchResult {
    let start = Instant::now();
    let config = scenario.config();
    let combat_priority = config.combat_priority;
    let mut invariants = InvariantTracker::new(&config);
    let mut sim = GuardSimulation::with_config(config);

    let rng = ChaCha8Rng::seed_from_u64(seed);
    let mut traffic = TrafficGenerator::new(rng, scenario.actors, scenario.mix);

    let mut time_series = time_series_dir.map(|_| TimeSeriesRecorder::new());

    let mut last = TickResult::default();
    let (mut offered, mut admitted, mut bypass, mut forced) = (0u64, 0u64, 0u64, 0u64);
    let (mut deferred, mut dropped, mut duplicates) = (0u64, 0u64, 0u64);
    let (mut drained, mut stale) = (0u64, 0u64);
    let mut utilization_sum = 0.0;
    let mut queue_sum = 0u64;
    let mut peak_queue = 0usize;

    for tick in 0..scenario.ticks {
        if let Some(ms) = scenario.query_at(tick) {
            sim.inject_navmesh_query(ms);
        }

        for ctx in traffic.generate_tick(scenario.lambda_at(tick)) {
            let admission = sim.offer(&ctx);
            invariants.record_admission(&ctx, admission, combat_priority);
        }

        let result = sim.tick_core();
        invariants.record_tick(&result);

        offered += result.offered as u64;
        admitted += result.admitted as u64;
        bypass += result.combat_bypass as u64;
        forced += result.forced as u64;
        deferred += result.deferred as u64;
        dropped += result.dropped as u64;
        duplicates += result.duplicates as u64;
        drained += result.drained as u64;
        stale += result.stale_evicted as u64;
        if result.budget > 0 {
            utilization_sum += result.budget_spent as f64 / result.budget as f64;
        }
        queue_sum += result.queue_len as u64;
        peak_queue = peak_queue.max(result.queue_len);

        if let Some(ts) = time_series.as_mut() {
            ts.record(&result);
        }
        last = result;
    }

    if let (Some(ts), Some(dir)) = (&time_series, time_series_dir) {
        let path = dir.join(format!("seed-{}.jsonl", seed));
        if let Err(e) = ts.write_jsonl(&path) {
            warn!(path = %path.display(), error = %e, "failed to write time series");
        }
    }

    let elapsed = start.elapsed();
    let elapsed_secs = elapsed.as_secs_f64().max(0.001);
    let ticks = scenario.ticks.max(1) as f64;
    let pct = |n: u64| if offered > 0 { n as f64 / offered as f64 * 100.0 } else { 100.0 };

    let service_rate = pct(admitted + bypass + forced + duplicates + drained);
    let drop_rate = if offered > 0 { pct(dropped) } else { 0.0 };
    let conserved = requests_conserved(&sim.status());

    // Evaluate pass/fail
    let c = &scenario.criteria;
    let mut pass = invariants.violations() == 0 && conserved;
    if c.require_guarded && !invariants.ever_guarded {
        pass = false;
    }
    if c.require_recovered && last.state != OverloadState::Normal {
        pass = false;
    }
    if c.require_forced && forced == 0 {
        pass = false;
    }
    if let Some(max) = c.max_transitions {
        if invariants.transitions > max {
            pass = false;
        }
    }
    if let Some(max) = c.max_drop_rate {
        if drop_rate > max {
            pass = false;
        }
    }
    if let Some(min) = c.min_service_rate {
        if service_rate < min {
            pass = false;
        }
    }

    debug!(scenario = scenario.name, seed, pass, offered, "run complete");

    BenchResult {
        scenario: scenario.label.to_string(),
        name: scenario.name.to_string(),
        category: scenario.category.to_string(),
        seed,
        pass,
        ticks: scenario.ticks,
        offered,
        admitted,
        combat_bypass: bypass,
        forced,
        deferred,
        dropped,
        duplicates,
        drained,
        stale_evicted: stale,
        service_rate,
        drop_rate,
        budget_utilization: utilization_sum / ticks * 100.0,
        peak_queue,
        mean_queue: queue_sum as f64 / ticks,
        transitions: invariants.transitions,
        guarded_ticks: invariants.guarded_ticks,
        final_state: last.state.label(),
        budget_violations: invariants.budget_violations,
        starvation_violations: invariants.starvation_violations,
        dwell_violations: invariants.dwell_violations,
        combat_refusals: invariants.combat_refusals,
        requests_conserved: conserved,
        elapsed_ms: elapsed.as_millis(),
        throughput_per_sec: scenario.ticks as f64 / elapsed_secs,
    }
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(
    scenario: &Scenario,
    n_runs: usize,
    base_seed: u64,
    time_series_base: Option<&std::path::Path>,
) -> MonteCarloReport {
    let ts_dir = time_series_base.map(|base| base.join(scenario.name.to_lowercase()));

    let results = (0..n_runs)
        .map(|i| run_single(scenario, base_seed + i as u64, ts_dir.as_deref()))
        .collect();

    aggregate(scenario, results)
}

fn stats_of(results: &[BenchResult], f: impl Fn(&BenchResult) -> f64) -> Stats {
    Stats::from_samples(&results.iter().map(f).collect::<Vec<_>>())
}

/// Aggregate individual runs into a MonteCarloReport.
fn aggregate(scenario: &Scenario, results: Vec<BenchResult>) -> MonteCarloReport {
    let n = results.len();
    let passed = results.iter().filter(|r| r.pass).count();
    let pass_rate = if n > 0 { passed as f64 / n as f64 } else { 0.0 };

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        category: scenario.category.to_string(),
        n_runs: n,
        pass_rate,
        service_rate: stats_of(&results, |r| r.service_rate),
        drop_rate: stats_of(&results, |r| r.drop_rate),
        budget_utilization: stats_of(&results, |r| r.budget_utilization),
        peak_queue: stats_of(&results, |r| r.peak_queue as f64),
        mean_queue: stats_of(&results, |r| r.mean_queue),
        transitions: stats_of(&results, |r| r.transitions as f64),
        guarded_ticks: stats_of(&results, |r| r.guarded_ticks as f64),
        forced: stats_of(&results, |r| r.forced as f64),
        elapsed_ms: stats_of(&results, |r| r.elapsed_ms as f64),
        throughput_per_sec: stats_of(&results, |r| r.throughput_per_sec),
        individual_runs: results,
    }
}
