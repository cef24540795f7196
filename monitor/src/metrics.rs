//! Monitor service metrics.
//!
//! Counters for the REST side of the monitor. Live feed counters live in
//! [`attendance_client::FeedMetrics`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the monitor service.
#[derive(Debug)]
pub struct MonitorMetrics {
    /// Snapshot polls attempted.
    snapshot_polls: AtomicU64,

    /// Snapshot polls that failed.
    snapshot_failures: AtomicU64,

    /// Summary refresh requests received from the bridge.
    refresh_requests: AtomicU64,

    /// Summary fetches performed.
    summary_refreshes: AtomicU64,

    /// Summary fetches that failed.
    summary_failures: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot_polls: AtomicU64::new(0),
            snapshot_failures: AtomicU64::new(0),
            refresh_requests: AtomicU64::new(0),
            summary_refreshes: AtomicU64::new(0),
            summary_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a snapshot poll.
    pub fn record_snapshot_poll(&self) {
        self.snapshot_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed snapshot poll.
    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a summary refresh request.
    pub fn record_refresh_request(&self) {
        self.refresh_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a summary fetch.
    pub fn record_summary_refresh(&self) {
        self.summary_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed summary fetch.
    pub fn record_summary_failure(&self) {
        self.summary_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns snapshot polls attempted.
    #[must_use]
    pub fn snapshot_polls(&self) -> u64 {
        self.snapshot_polls.load(Ordering::Relaxed)
    }

    /// Returns failed snapshot polls.
    #[must_use]
    pub fn snapshot_failures(&self) -> u64 {
        self.snapshot_failures.load(Ordering::Relaxed)
    }

    /// Returns summary refresh requests.
    #[must_use]
    pub fn refresh_requests(&self) -> u64 {
        self.refresh_requests.load(Ordering::Relaxed)
    }

    /// Returns summary fetches.
    #[must_use]
    pub fn summary_refreshes(&self) -> u64 {
        self.summary_refreshes.load(Ordering::Relaxed)
    }

    /// Returns failed summary fetches.
    #[must_use]
    pub fn summary_failures(&self) -> u64 {
        self.summary_failures.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the share of snapshot polls that succeeded (0.0 to 1.0).
    #[must_use]
    pub fn snapshot_success_rate(&self) -> f64 {
        let polls = self.snapshot_polls();
        if polls > 0 {
            polls.saturating_sub(self.snapshot_failures()) as f64 / polls as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MonitorMetricsSnapshot {
        MonitorMetricsSnapshot {
            snapshot_polls: self.snapshot_polls(),
            snapshot_failures: self.snapshot_failures(),
            refresh_requests: self.refresh_requests(),
            summary_refreshes: self.summary_refreshes(),
            summary_failures: self.summary_failures(),
            uptime: self.uptime(),
        }
    }
}

/// A point-in-time snapshot of monitor metrics.
#[derive(Debug, Clone)]
pub struct MonitorMetricsSnapshot {
    /// Snapshot polls attempted.
    pub snapshot_polls: u64,
    /// Failed snapshot polls.
    pub snapshot_failures: u64,
    /// Summary refresh requests.
    pub refresh_requests: u64,
    /// Summary fetches.
    pub summary_refreshes: u64,
    /// Failed summary fetches.
    pub summary_failures: u64,
    /// Uptime.
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = MonitorMetrics::new();
        assert_eq!(metrics.snapshot_polls(), 0);
        assert_eq!(metrics.summary_refreshes(), 0);
        assert_eq!(metrics.snapshot_success_rate(), 0.0);
    }

    #[test]
    fn test_metrics_snapshot_success_rate() {
        let metrics = MonitorMetrics::default();
        for _ in 0..4 {
            metrics.record_snapshot_poll();
        }
        metrics.record_snapshot_failure();

        assert!((metrics.snapshot_success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = MonitorMetrics::new();
        metrics.record_refresh_request();
        metrics.record_refresh_request();
        metrics.record_summary_refresh();
        metrics.record_summary_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.refresh_requests, 2);
        assert_eq!(snapshot.summary_refreshes, 1);
        assert_eq!(snapshot.summary_failures, 1);
        assert_eq!(snapshot.snapshot_polls, 0);
    }
}
