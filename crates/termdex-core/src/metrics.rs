//! Request metrics for the termdex daemon.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Atomic counters for daemon request handling.
pub struct Metrics {
    /// Total number of requests processed
    pub requests_total: AtomicU64,
    /// Requests answered with an error response
    pub requests_failed: AtomicU64,
    /// Sum of all request latencies in microseconds
    pub requests_latency_us: AtomicU64,
    /// Indexing passes triggered through the daemon
    pub reindex_total: AtomicU64,
    /// Relevant file changes reported by watchers or clients
    pub file_changes: AtomicU64,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_latency_us: AtomicU64::new(0),
            reindex_total: AtomicU64::new(0),
            file_changes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed request.
    pub fn record_request(&self, latency: Duration, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reindex(&self) {
        self.reindex_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_change(&self) {
        self.file_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Mean latency over every request so far.
    pub fn avg_latency(&self) -> Duration {
        let total = self.requests_total.load(Ordering::Relaxed);
        let latency_us = self.requests_latency_us.load(Ordering::Relaxed);
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(latency_us / total)
        }
    }
}

/// Sliding window of latency samples tagged by operation.
pub struct LatencyTracker {
    samples: RwLock<VecDeque<(&'static str, Duration)>>,
    max_samples: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    /// Record a sample, evicting the oldest past capacity.
    pub fn record(&self, operation: &'static str, duration: Duration) {
        let mut samples = self.samples.write();
        samples.push_back((operation, duration));

        while samples.len() > self.max_samples {
            samples.pop_front();
        }
    }

    pub fn p50(&self, operation: &str) -> Duration {
        self.percentile(Some(operation), 0.50)
    }

    pub fn p99(&self, operation: &str) -> Duration {
        self.percentile(Some(operation), 0.99)
    }

    /// P99 across every operation.
    pub fn p99_all(&self) -> Duration {
        self.percentile(None, 0.99)
    }

    /// Percentile `p` (0.0 - 1.0) of one operation, or of all when `None`.
    pub fn percentile(&self, operation: Option<&str>, p: f64) -> Duration {
        let mut durations: Vec<_> = {
            let samples = self.samples.read();
            samples
                .iter()
                .filter(|(op, _)| operation.map_or(true, |wanted| *op == wanted))
                .map(|(_, d)| *d)
                .collect()
        };

        if durations.is_empty() {
            return Duration::ZERO;
        }

        durations.sort();
        let idx = ((durations.len() as f64 * p) as usize).min(durations.len() - 1);
        durations[idx]
    }

    pub fn sample_count(&self, operation: &str) -> usize {
        self.samples
            .read()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_request_recording() {
        let metrics = Metrics::new();
        metrics.record_request(Duration::from_millis(10), true);
        metrics.record_request(Duration::from_millis(20), false);

        assert_eq!(metrics.requests(), 2);
        assert_eq!(metrics.requests_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_latency(), Duration::from_millis(15));
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = Metrics::default();
        metrics.record_reindex();
        metrics.record_file_change();
        metrics.record_file_change();

        assert_eq!(metrics.reindex_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.file_changes.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.avg_latency(), Duration::ZERO);
    }

    #[test]
    fn test_latency_tracker_percentiles() {
        let tracker = LatencyTracker::new(100);
        for i in 1..=100 {
            tracker.record("lookup", Duration::from_millis(i));
        }

        let p50 = tracker.p50("lookup");
        assert!(p50 >= Duration::from_millis(50) && p50 <= Duration::from_millis(51));
        assert_eq!(tracker.p99("lookup"), Duration::from_millis(100));
    }

    #[test]
    fn test_latency_tracker_filters_by_operation() {
        let tracker = LatencyTracker::new(10);
        tracker.record("lookup", Duration::from_millis(1));
        tracker.record("search", Duration::from_millis(9));

        assert_eq!(tracker.p99("lookup"), Duration::from_millis(1));
        assert_eq!(tracker.p99_all(), Duration::from_millis(9));
        assert_eq!(tracker.sample_count("search"), 1);
        assert_eq!(tracker.p99("missing"), Duration::ZERO);
    }

    #[test]
    fn test_latency_tracker_window() {
        let tracker = LatencyTracker::new(3);
        for i in 1..=5 {
            tracker.record("lookup", Duration::from_millis(i));
        }
        assert_eq!(tracker.sample_count("lookup"), 3);
    }
}
