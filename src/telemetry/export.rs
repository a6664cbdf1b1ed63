//! Metrics export.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Trait for exporting metrics to different formats
pub trait MetricsExporter: Send + Sync {
    /// Export a metrics snapshot
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Writes snapshots to a file as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_path: PathBuf,
}

impl JsonExporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn to_json(snapshot: &MetricsSnapshot) -> Result<String> {
        serde_json::to_string_pretty(&SerializableSnapshot::from(snapshot))
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let json = Self::to_json(snapshot)?;
        std::fs::write(&self.output_path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    tasks_submitted: u64,
    tasks_rejected: u64,
    tasks_started: u64,
    tasks_stolen: u64,
    tasks_succeeded: u64,
    tasks_failed: u64,
    tasks_panicked: u64,
    tasks_cancelled: u64,
    callbacks_delivered: u64,
    callbacks_panicked: u64,
    avg_run_us: f64,
    p50_run_us: f64,
    p99_run_us: f64,
    max_run_us: f64,
    p50_delivery_us: f64,
    p99_delivery_us: f64,
    failure_rate: f64,
    tasks_per_second: f64,
}

fn micros(ns: u64) -> f64 {
    ns as f64 / 1_000.0
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            tasks_submitted: snapshot.tasks_submitted,
            tasks_rejected: snapshot.tasks_rejected,
            tasks_started: snapshot.tasks_started,
            tasks_stolen: snapshot.tasks_stolen,
            tasks_succeeded: snapshot.tasks_succeeded,
            tasks_failed: snapshot.tasks_failed,
            tasks_panicked: snapshot.tasks_panicked,
            tasks_cancelled: snapshot.tasks_cancelled,
            callbacks_delivered: snapshot.callbacks_delivered,
            callbacks_panicked: snapshot.callbacks_panicked,
            avg_run_us: micros(snapshot.avg_run_ns),
            p50_run_us: micros(snapshot.p50_run_ns),
            p99_run_us: micros(snapshot.p99_run_ns),
            max_run_us: micros(snapshot.max_run_ns),
            p50_delivery_us: micros(snapshot.p50_delivery_ns),
            p99_delivery_us: micros(snapshot.p99_delivery_ns),
            failure_rate: snapshot.failure_rate(),
            tasks_per_second: snapshot.tasks_per_second(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Metrics;
    use std::time::Duration;

    #[test]
    fn test_json_contains_counters() {
        let metrics = Metrics::new();
        metrics.record_submitted();
        metrics.record_success(Duration::from_micros(3));

        let json = JsonExporter::to_json(&metrics.snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["tasks_submitted"], 1);
        assert_eq!(value["tasks_succeeded"], 1);
        assert_eq!(value["failure_rate"], 0.0);
    }

    #[test]
    fn test_export_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "handoff-metrics-{}.json",
            std::process::id()
        ));
        let exporter = JsonExporter::new(&path);

        exporter.export(&Metrics::new().snapshot()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"callbacks_delivered\": 0"));
        let _ = std::fs::remove_file(&path);
    }
}
