// Admission Guard Benchmark Runner v0.2.0 - Monte Carlo load validation
// Poisson traffic, seedable PRNG, per-tick invariant audit
//
// Usage:
//   cargo run --release --bin bench                     # Run all scenarios (30 runs each)
//   cargo run --release --bin bench -- --runs 5         # Quick mode (5 runs each)
//   cargo run --release --bin bench -- SURGE            # Filter by name
//   cargo run --release --bin bench -- --time-series    # Enable JSONL output
//   cargo run --release --bin bench -- --seed 42        # Custom base seed
//   RUST_LOG=pathfinding_governor=debug cargo run --bin bench -- --runs 1 STEADY

mod report;
mod scenarios;
mod monte_carlo;
mod traffic;
mod metrics;
mod time_series;

use report::*;
use scenarios::*;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;
use tracing_subscriber::prelude::*;

/// Share of runs that must pass for a scenario to pass.
const PASS_THRESHOLD: f64 = 0.933;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    time_series: bool,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        time_series: false,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--time-series" => {
                cli.time_series = true;
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    // Library logs stay quiet unless RUST_LOG asks for them.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn write_report(report: &BenchReport, timestamp: &str) -> std::io::Result<std::path::PathBuf> {
    let dir = std::path::Path::new("benchmark-results");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(&path, json)?;
    Ok(path)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    init_tracing();
    let cli = parse_args();
    let all_scenarios = scenarios();

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    let ts_dir = cli.time_series
        .then(|| std::path::Path::new("benchmark-results/time-series").to_path_buf());

    println!("\n  Admission Guard Benchmark Runner v0.2.0");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!("  {:<28} {:>5} {:>12} {:>7} {:>8} {:>6} {:>7} {:>7}",
        "Scenario", "Pass%", "Served%", "Drop%", "PeakQ", "Trans", "Guard", "Time");
    println!("  {}", "-".repeat(90));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = monte_carlo::run_monte_carlo(
            scenario,
            cli.runs,
            cli.seed,
            ts_dir.as_deref(),
        );

        let pass_pct = report.pass_rate * 100.0;
        let status = if report.pass_rate >= PASS_THRESHOLD { "PASS" } else { "FAIL" };

        println!("  {:<28} {:>4}% {:>6.1}±{:<4.1} {:>6.2}% {:>8.0} {:>6.1} {:>7.0} {:>5.0}ms  {}",
            report.label,
            pass_pct as u32,
            report.service_rate.mean, report.service_rate.half_width(),
            report.drop_rate.mean,
            report.peak_queue.mean,
            report.transitions.mean,
            report.guarded_ticks.mean,
            report.elapsed_ms.mean,
            status,
        );

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();
    let invariants = InvariantSummary::from_reports(&mc_reports);

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= PASS_THRESHOLD).count();
    let failed = total - passed;

    let verdict = |ok: bool| if ok { "PASS" } else { "FAIL" };
    println!("  {}", "-".repeat(90));
    println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total, passed, failed, suite_elapsed.as_secs_f64());

    println!("  Invariants (every tick, every run):");
    println!("    Budget bound:          {}", verdict(invariants.budget_bound));
    println!("    Starvation bound:      {}", verdict(invariants.starvation_bound));
    println!("    Dwell-time bound:      {}", verdict(invariants.dwell_bound));
    println!("    Combat bypass:         {}", verdict(invariants.combat_bypass));
    println!("    Request conservation:  {}\n", verdict(invariants.request_conservation));

    // ─── Write JSON Report ──────────────────────────────────────────────

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string();

    let all_hold = invariants.all_hold();
    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: "0.2.0",
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        invariants,
        scenarios: mc_reports,
    };

    match write_report(&report, &timestamp) {
        Ok(path) => println!("  Results saved to: {}\n", path.display()),
        Err(e) => warn!(error = %e, "failed to write benchmark report"),
    }

    if failed > 0 || !all_hold {
        std::process::exit(1);
    }
}
