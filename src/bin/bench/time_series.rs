// Per-Tick JSONL Time Series Recorder
// Outputs one JSON line per tick for independent analysis

use pathfinding_governor::TickResult;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TickSnapshot {
    #[serde(flatten)]
    pub result: TickResult,
    pub state_label: &'static str,
    /// Share of the tick budget spent, in percent.
    pub utilization: f64,
}

impl TickSnapshot {
    pub fn from_result(result: &TickResult) -> Self {
        let utilization = if result.budget > 0 {
            result.budget_spent as f64 / result.budget as f64 * 100.0
        } else {
            0.0
        };
        Self {
            result: result.clone(),
            state_label: result.state.label(),
            utilization,
        }
    }
}

/// Time series recorder that accumulates snapshots and writes JSONL
pub struct TimeSeriesRecorder {
    snapshots: Vec<TickSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn new() -> Self {
        Self { snapshots: Vec::new() }
    }

    pub fn record(&mut self, result: &TickResult) {
        self.snapshots.push(TickSnapshot::from_result(result));
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
