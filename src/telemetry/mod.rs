//! Executor metrics and their export.

pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use export::{JsonExporter, MetricsExporter};
