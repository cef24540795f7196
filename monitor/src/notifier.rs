//! Side effect sinks used by the monitor.

use std::sync::Arc;

use attendance_client::{Notification, Notifier, RefreshScheduler};
use tokio::sync::mpsc;
use tracing::info;

use crate::metrics::MonitorMetrics;

/// Renders notifications as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            person_id = %notification.person_id,
            level = %notification.level,
            "{}: {}",
            notification.title,
            notification.body
        );
    }
}

/// Forwards refresh requests to the service loop, which debounces them.
#[derive(Debug, Clone)]
pub struct ChannelRefresh {
    tx: mpsc::UnboundedSender<()>,
    metrics: Arc<MonitorMetrics>,
}

impl ChannelRefresh {
    /// Creates a scheduler and the receiver the service loop drains.
    #[must_use]
    pub fn channel(metrics: Arc<MonitorMetrics>) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, metrics }, rx)
    }
}

impl RefreshScheduler for ChannelRefresh {
    fn request_summary_refresh(&self) {
        self.metrics.record_refresh_request();
        // Receiver gone means the service is shutting down.
        let _ = self.tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use attendance_client::NotificationLevel;

    use super::*;

    #[tokio::test]
    async fn test_channel_refresh_forwards_requests() {
        let metrics = Arc::new(MonitorMetrics::new());
        let (refresh, mut rx) = ChannelRefresh::channel(Arc::clone(&metrics));

        refresh.request_summary_refresh();
        refresh.request_summary_refresh();

        assert_eq!(rx.recv().await, Some(()));
        assert_eq!(rx.recv().await, Some(()));
        assert_eq!(metrics.refresh_requests(), 2);
    }

    #[test]
    fn test_channel_refresh_after_receiver_dropped() {
        let metrics = Arc::new(MonitorMetrics::new());
        let (refresh, rx) = ChannelRefresh::channel(Arc::clone(&metrics));
        drop(rx);

        refresh.request_summary_refresh();
        assert_eq!(metrics.refresh_requests(), 1);
    }

    #[test]
    fn test_log_notifier_accepts_both_levels() {
        let notifier = LogNotifier;
        for level in [NotificationLevel::Success, NotificationLevel::Info] {
            notifier.notify(Notification {
                title: "Check-in".to_string(),
                body: "Alice checked in".to_string(),
                level,
                person_id: "P1".to_string(),
            });
        }
    }
}
