//! Side effects of applied attendance changes.
//!
//! The [`SideEffectBridge`] turns every change the reconciler applies into
//! one user notification and one summary refresh request. Rate limiting of
//! refreshes is left to the [`RefreshScheduler`].

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::reconcile::{AppliedChange, ChangeKind, ChangeSink};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// Positive event, such as a check-in.
    Success,
    /// Neutral event.
    Info,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title.
    pub title: String,
    /// One-line description.
    pub body: String,
    /// Severity.
    pub level: NotificationLevel,
    /// Person the notification is about.
    pub person_id: String,
}

impl Notification {
    /// Builds the notification for an applied change.
    #[must_use]
    pub fn for_change(change: &AppliedChange) -> Self {
        let name = change.status.display_name();
        let (title, body, level) = match change.kind {
            ChangeKind::CheckIn => (
                "Check-in",
                format!("{} checked in", name),
                NotificationLevel::Success,
            ),
            ChangeKind::CheckOut => (
                "Check-out",
                match change.duration_minutes {
                    Some(minutes) => format!("{} checked out after {} min", name, minutes),
                    None => format!("{} checked out", name),
                },
                NotificationLevel::Info,
            ),
            ChangeKind::StatusUpdate => (
                "Status update",
                if change.status.checked_in {
                    format!("{} is checked in", name)
                } else {
                    format!("{} is checked out", name)
                },
                NotificationLevel::Info,
            ),
        };

        Self {
            title: title.to_string(),
            body,
            level,
            person_id: change.person_id().to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.title, self.body)
    }
}

/// Presents notifications to the user.
pub trait Notifier: Send + Sync {
    /// Shows a notification.
    fn notify(&self, notification: Notification);
}

/// Schedules a refresh of the daily summary.
pub trait RefreshScheduler: Send + Sync {
    /// Requests a summary refresh. Implementations may coalesce requests.
    fn request_summary_refresh(&self);
}

/// Forwards applied changes to a notifier and a refresh scheduler.
#[derive(Clone)]
pub struct SideEffectBridge {
    notifier: Arc<dyn Notifier>,
    refresh: Arc<dyn RefreshScheduler>,
}

impl fmt::Debug for SideEffectBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectBridge").finish_non_exhaustive()
    }
}

impl SideEffectBridge {
    /// Creates a bridge.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, refresh: Arc<dyn RefreshScheduler>) -> Self {
        Self { notifier, refresh }
    }
}

impl ChangeSink for SideEffectBridge {
    fn on_change(&self, change: &AppliedChange) {
        let notification = Notification::for_change(change);
        debug!(person_id = %notification.person_id, title = %notification.title, "Dispatching side effects");
        self.notifier.notify(notification);
        self.refresh.request_summary_refresh();
    }
}
