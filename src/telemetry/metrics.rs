//! Counters and latency histogram for the executor.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Executor metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Submission
    tasks_submitted: AtomicU64,
    tasks_rejected: AtomicU64,

    // Worker side
    tasks_started: AtomicU64,
    tasks_stolen: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_panicked: AtomicU64,

    // Dispatcher side
    tasks_cancelled: AtomicU64,
    callbacks_delivered: AtomicU64,
    callbacks_panicked: AtomicU64,

    // Time spent inside `run`
    run_latency: RwLock<Histogram<u64>>,
    // Submit to callback
    delivery_latency: RwLock<Histogram<u64>>,

    start_time: Instant,
}

fn latency_histogram() -> Histogram<u64> {
    // 3 significant figures, up to one hour in nanoseconds
    Histogram::new_with_max(3_600_000_000_000, 3).expect("static histogram bounds are valid")
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_started: AtomicU64::new(0),
            tasks_stolen: AtomicU64::new(0),
            tasks_succeeded: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            callbacks_delivered: AtomicU64::new(0),
            callbacks_panicked: AtomicU64::new(0),
            run_latency: RwLock::new(latency_histogram()),
            delivery_latency: RwLock::new(latency_histogram()),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stolen(&self) {
        self.tasks_stolen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, run_time: Duration) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_run_time(run_time);
    }

    pub fn record_failure(&self, run_time: Duration) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.record_run_time(run_time);
    }

    /// A panic in `run`; also counted as a failure.
    pub fn record_panic(&self, run_time: Duration) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        self.record_failure(run_time);
    }

    pub fn record_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, since_submit: Duration) {
        self.callbacks_delivered.fetch_add(1, Ordering::Relaxed);
        let _ = self.delivery_latency.write().record(as_nanos(since_submit));
    }

    pub fn record_callback_panic(&self) {
        self.callbacks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    fn record_run_time(&self, run_time: Duration) {
        // Skip rather than stall a worker behind a snapshot.
        if let Some(mut hist) = self.run_latency.try_write() {
            let _ = hist.record(as_nanos(run_time));
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let run = self.run_latency.read();
        let delivery = self.delivery_latency.read();

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_stolen: self.tasks_stolen.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            callbacks_delivered: self.callbacks_delivered.load(Ordering::Relaxed),
            callbacks_panicked: self.callbacks_panicked.load(Ordering::Relaxed),
            avg_run_ns: if run.len() > 0 { run.mean() as u64 } else { 0 },
            p50_run_ns: run.value_at_quantile(0.50),
            p99_run_ns: run.value_at_quantile(0.99),
            max_run_ns: run.max(),
            p50_delivery_ns: delivery.value_at_quantile(0.50),
            p99_delivery_ns: delivery.value_at_quantile(0.99),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.tasks_submitted,
            &self.tasks_rejected,
            &self.tasks_started,
            &self.tasks_stolen,
            &self.tasks_succeeded,
            &self.tasks_failed,
            &self.tasks_panicked,
            &self.tasks_cancelled,
            &self.callbacks_delivered,
            &self.callbacks_panicked,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        self.run_latency.write().reset();
        self.delivery_latency.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_rejected: u64,
    pub tasks_started: u64,
    pub tasks_stolen: u64,
    pub tasks_succeeded: u64,
    /// Includes panics.
    pub tasks_failed: u64,
    pub tasks_panicked: u64,
    pub tasks_cancelled: u64,
    pub callbacks_delivered: u64,
    pub callbacks_panicked: u64,
    pub avg_run_ns: u64,
    pub p50_run_ns: u64,
    pub p99_run_ns: u64,
    pub max_run_ns: u64,
    pub p50_delivery_ns: u64,
    pub p99_delivery_ns: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished runs that failed (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let finished = self.tasks_succeeded + self.tasks_failed;
        if finished == 0 {
            return 0.0;
        }
        self.tasks_failed as f64 / finished as f64
    }

    /// Finished runs per second of uptime
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        (self.tasks_succeeded + self.tasks_failed) as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_success(Duration::from_micros(1));
        metrics.record_panic(Duration::from_micros(2));
        metrics.record_stolen();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 2);
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.tasks_panicked, 1);
        assert_eq!(snapshot.tasks_stolen, 1);
        assert!(snapshot.avg_run_ns > 0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();

        metrics.record_success(Duration::from_micros(1));
        metrics.record_delivered(Duration::from_micros(5));
        assert_eq!(metrics.snapshot().tasks_succeeded, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_succeeded, 0);
        assert_eq!(snapshot.callbacks_delivered, 0);
        assert_eq!(snapshot.avg_run_ns, 0);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().failure_rate(), 0.0);

        metrics.record_success(Duration::from_micros(1));
        metrics.record_failure(Duration::from_micros(1));
        metrics.record_success(Duration::from_micros(1));
        metrics.record_failure(Duration::from_micros(1));

        assert_eq!(metrics.snapshot().failure_rate(), 0.5);
    }
}
