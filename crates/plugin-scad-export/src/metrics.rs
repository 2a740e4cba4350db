//! Export metrics.
//!
//! Counts files seen, skipped, exported and failed during a build, plus a
//! bounded window of export durations for P50/P95/P99. Thread-safe via
//! atomics for counters and a mutex for samples.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Export metrics collector.
#[derive(Debug, Default)]
pub struct ExportMetrics {
    /// Source files that reached the orchestrator.
    pub files_seen: AtomicU64,
    /// Files whose mesh was up to date.
    pub skipped: AtomicU64,
    /// Compiler runs started.
    pub exports_started: AtomicU64,
    /// Compiler runs that exited with code 0.
    pub exports_succeeded: AtomicU64,
    /// Compiler runs that failed.
    pub exports_failed: AtomicU64,
    /// Files aborted by a local error (unreadable source, no permalink).
    pub errors: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl ExportMetrics {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file entering the pipeline.
    pub fn record_seen(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an up-to-date file.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a compiler start.
    pub fn record_started(&self) {
        self.exports_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful export and its duration.
    pub fn record_success(&self, duration: Duration) {
        self.exports_succeeded.fetch_add(1, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// Record a failed export.
    pub fn record_failure(&self) {
        self.exports_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a per-file error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    /// Current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let (p50, p95, p99) = percentiles(&durations);

        MetricsSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            exports_started: self.exports_started.load(Ordering::Relaxed),
            exports_succeeded: self.exports_succeeded.load(Ordering::Relaxed),
            exports_failed: self.exports_failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            duration_p50: p50,
            duration_p95: p95,
            duration_p99: p99,
            sample_count: durations.len() as u64,
        }
    }
}

fn percentiles(durations: &[Duration]) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
    if durations.is_empty() {
        return (None, None, None);
    }

    let mut sorted = durations.to_vec();
    sorted.sort();
    let len = sorted.len();

    let p50 = sorted.get(len * 50 / 100).copied();
    let p95 = sorted.get(len * 95 / 100).copied();
    let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

    (p50, p95, p99)
}

/// A point-in-time copy of [`ExportMetrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Source files seen.
    pub files_seen: u64,
    /// Up-to-date files.
    pub skipped: u64,
    /// Compiler runs started.
    pub exports_started: u64,
    /// Successful exports.
    pub exports_succeeded: u64,
    /// Failed exports.
    pub exports_failed: u64,
    /// Per-file errors.
    pub errors: u64,
    /// P50 export duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p50: Option<Duration>,
    /// P95 export duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p95: Option<Duration>,
    /// P99 export duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p99: Option<Duration>,
    /// Number of duration samples.
    pub sample_count: u64,
}

/// Serialize an optional Duration as milliseconds.
fn serialize_opt_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Deserialize an optional Duration from milliseconds.
fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: Option<u64> = Deserialize::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let m = ExportMetrics::new();
        m.record_seen();
        m.record_seen();
        m.record_skipped();
        m.record_started();
        m.record_success(Duration::from_secs(2));
        m.record_error();

        let snap = m.snapshot();
        assert_eq!(snap.files_seen, 2);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.exports_started, 1);
        assert_eq!(snap.exports_succeeded, 1);
        assert_eq!(snap.exports_failed, 0);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.sample_count, 1);
    }

    #[test]
    fn test_metrics_percentiles() {
        let m = ExportMetrics::new();
        for i in 1..=100 {
            m.record_success(Duration::from_millis(i * 10));
        }

        let snap = m.snapshot();
        let p50 = snap.duration_p50.expect("p50");
        let p95 = snap.duration_p95.expect("p95");
        let p99 = snap.duration_p99.expect("p99");
        assert!(p95 > p50);
        assert!(p99 >= p95);
    }

    #[test]
    fn test_failure_has_no_sample() {
        let m = ExportMetrics::new();
        m.record_failure();
        let snap = m.snapshot();
        assert_eq!(snap.exports_failed, 1);
        assert!(snap.duration_p50.is_none());
        assert_eq!(snap.sample_count, 0);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let m = ExportMetrics::new();
        for _ in 0..MAX_DURATION_SAMPLES + 5 {
            m.record_success(Duration::from_millis(1));
        }
        assert_eq!(m.snapshot().sample_count, MAX_DURATION_SAMPLES as u64);
    }

    #[test]
    fn test_snapshot_serialization() {
        let m = ExportMetrics::new();
        m.record_success(Duration::from_millis(1250));
        let json = serde_json::to_string(&m.snapshot()).expect("serialize");
        let deser: MetricsSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deser.exports_succeeded, 1);
        assert_eq!(deser.duration_p50, Some(Duration::from_millis(1250)));
    }
}
