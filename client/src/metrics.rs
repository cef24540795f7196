//! Live feed metrics.
//!
//! Provides atomic counters for monitoring the connection, the router, and
//! the reconciler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the live attendance feed.
#[derive(Debug)]
pub struct FeedMetrics {
    /// Connections opened, including reconnections.
    connections_opened: AtomicU64,

    /// Reconnection attempts scheduled.
    reconnect_attempts: AtomicU64,

    /// Times the connection gave up reconnecting.
    give_ups: AtomicU64,

    /// Raw frames received.
    frames_received: AtomicU64,

    /// Frames dropped because they could not be parsed.
    malformed_frames: AtomicU64,

    /// Handler invocations that failed or panicked.
    handler_failures: AtomicU64,

    /// Push events applied to the status map.
    events_applied: AtomicU64,

    /// Push events discarded as stale or duplicate.
    stale_events_dropped: AtomicU64,

    /// REST snapshots applied.
    snapshots_applied: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            give_ups: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            stale_events_dropped: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records an opened connection.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnection attempt.
    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records that reconnection was abandoned.
    pub fn record_give_up(&self) {
        self.give_ups.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a received frame.
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a malformed frame.
    pub fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed handler invocation.
    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an applied push event.
    pub fn record_event_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a discarded push event.
    pub fn record_stale_event(&self) {
        self.stale_events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an applied snapshot.
    pub fn record_snapshot(&self) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns connections opened.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns reconnection attempts.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Returns give-ups.
    #[must_use]
    pub fn give_ups(&self) -> u64 {
        self.give_ups.load(Ordering::Relaxed)
    }

    /// Returns frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Returns malformed frames.
    #[must_use]
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames.load(Ordering::Relaxed)
    }

    /// Returns handler failures.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    /// Returns applied events.
    #[must_use]
    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    /// Returns discarded events.
    #[must_use]
    pub fn stale_events_dropped(&self) -> u64 {
        self.stale_events_dropped.load(Ordering::Relaxed)
    }

    /// Returns applied snapshots.
    #[must_use]
    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the share of received frames that were malformed (0.0 to 1.0).
    #[must_use]
    pub fn malformed_rate(&self) -> f64 {
        let frames = self.frames_received();
        if frames > 0 {
            self.malformed_frames() as f64 / frames as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> FeedMetricsSnapshot {
        FeedMetricsSnapshot {
            connections_opened: self.connections_opened(),
            reconnect_attempts: self.reconnect_attempts(),
            give_ups: self.give_ups(),
            frames_received: self.frames_received(),
            malformed_frames: self.malformed_frames(),
            handler_failures: self.handler_failures(),
            events_applied: self.events_applied(),
            stale_events_dropped: self.stale_events_dropped(),
            snapshots_applied: self.snapshots_applied(),
            uptime: self.uptime(),
        }
    }
}

/// A point-in-time snapshot of feed metrics.
#[derive(Debug, Clone)]
pub struct FeedMetricsSnapshot {
    /// Connections opened.
    pub connections_opened: u64,
    /// Reconnection attempts.
    pub reconnect_attempts: u64,
    /// Give-ups.
    pub give_ups: u64,
    /// Frames received.
    pub frames_received: u64,
    /// Malformed frames.
    pub malformed_frames: u64,
    /// Handler failures.
    pub handler_failures: u64,
    /// Applied events.
    pub events_applied: u64,
    /// Discarded events.
    pub stale_events_dropped: u64,
    /// Applied snapshots.
    pub snapshots_applied: u64,
    /// Uptime.
    pub uptime: Duration,
}
