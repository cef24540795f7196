//! Status reconciliation.
//!
//! [`StateReconciler`] owns the [`StatusMap`]. Push events are folded in only
//! when their `event_timestamp` is strictly newer than the last one applied
//! for the same person; pulled snapshots overwrite entries unconditionally.
//! Readers get immutable `Arc` snapshots of the map.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::metrics::FeedMetrics;
use crate::types::{PersonStatus, StatusMap, Timestamp};
use crate::ws::messages::{
    AttendanceAction, AttendanceEvent, InboundMessage, InitialStatus, MessageKind,
    PersonStatusUpdate,
};
use crate::ws::router::{MessageRouter, SubscriptionHandle};

/// Source of full status snapshots, typically the REST API.
pub trait SnapshotSource: Send + Sync {
    /// Error returned when a snapshot cannot be fetched.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the current status of every known person.
    fn fetch_snapshot(
        &self,
    ) -> impl Future<Output = Result<Vec<PersonStatus>, Self::Error>> + Send;
}

/// What an applied push event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The person checked in.
    CheckIn,
    /// The person checked out.
    CheckOut,
    /// The person's status was replaced by a status update.
    StatusUpdate,
}

/// A push event that was folded into the status map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    /// What changed.
    pub kind: ChangeKind,
    /// Ordering timestamp of the event.
    pub event_timestamp: Timestamp,
    /// Duration reported by a check-out.
    pub duration_minutes: Option<i64>,
    /// The person's entry after the change.
    pub status: PersonStatus,
}

impl AppliedChange {
    /// Returns the person the change is about.
    #[must_use]
    pub fn person_id(&self) -> &str {
        &self.status.person_id
    }
}

/// Receives every applied change.
pub trait ChangeSink: Send + Sync {
    /// Called once per applied push event, outside the reconciler lock.
    fn on_change(&self, change: &AppliedChange);
}

#[derive(Debug, Default)]
struct ReconcilerState {
    statuses: StatusMap,
    /// Event timestamp of the last push event applied per person.
    last_applied: HashMap<String, Timestamp>,
}

/// Folds push events and snapshots into one status map.
#[derive(Debug)]
pub struct StateReconciler {
    state: Mutex<ReconcilerState>,
    published: watch::Sender<Arc<StatusMap>>,
    metrics: Arc<FeedMetrics>,
}

impl StateReconciler {
    /// Creates a reconciler with an empty map.
    #[must_use]
    pub fn new(metrics: Arc<FeedMetrics>) -> Self {
        let (published, _) = watch::channel(Arc::new(StatusMap::new()));
        Self {
            state: Mutex::new(ReconcilerState::default()),
            published,
            metrics,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the map if it differs from the last published one.
    fn publish(&self, statuses: &StatusMap) -> bool {
        self.published.send_if_modified(|current| {
            if current.as_ref() == statuses {
                false
            } else {
                *current = Arc::new(statuses.clone());
                true
            }
        })
    }

    /// Overwrites the entry of every listed person.
    ///
    /// Persons missing from the snapshot keep their entries. Last-applied
    /// event timestamps are left untouched, so a push event newer than the
    /// ones already seen still applies afterwards.
    ///
    /// Returns the number of entries written.
    pub fn apply_snapshot(&self, statuses: Vec<PersonStatus>) -> usize {
        let count = statuses.len();
        let mut state = self.lock_state();
        for status in statuses {
            state.statuses.insert(status.person_id.clone(), status);
        }
        let changed = self.publish(&state.statuses);
        drop(state);

        self.metrics.record_snapshot();
        debug!(entries = count, changed, "Applied status snapshot");
        count
    }

    /// Applies the server's `initial_status` message as a one-person
    /// snapshot, keeping the fields the message does not carry.
    pub fn apply_initial_status(&self, initial: &InitialStatus) {
        let mut state = self.lock_state();
        let entry = state
            .statuses
            .entry(initial.person_id.clone())
            .or_insert_with(|| PersonStatus::new(initial.person_id.clone(), ""));
        entry.checked_in = initial.checked_in;
        entry.check_in_time = initial.check_in_time;
        entry.current_duration_minutes = initial.current_duration_minutes;
        self.publish(&state.statuses);
        drop(state);

        self.metrics.record_snapshot();
        debug!(person_id = %initial.person_id, checked_in = initial.checked_in, "Applied initial status");
    }

    /// Folds a push event into the map.
    ///
    /// Returns the change, or `None` when the message is not a status event
    /// or its `event_timestamp` is not newer than the last applied one for
    /// the person.
    pub fn apply_event(&self, msg: &InboundMessage) -> Option<AppliedChange> {
        let (person_id, event_timestamp) = match msg {
            InboundMessage::AttendanceEvent(e) => (&e.person_id, e.event_timestamp),
            InboundMessage::PersonStatusUpdate(u) => (&u.person_id, u.event_timestamp),
            _ => return None,
        };

        let mut state = self.lock_state();
        if let Some(last) = state.last_applied.get(person_id) {
            if event_timestamp <= *last {
                drop(state);
                self.metrics.record_stale_event();
                debug!(
                    person_id = %person_id,
                    event_timestamp = %event_timestamp,
                    "Dropping stale event"
                );
                return None;
            }
        }

        let entry = state
            .statuses
            .entry(person_id.clone())
            .or_insert_with(|| PersonStatus::new(person_id.clone(), ""));
        let (kind, duration_minutes) = match msg {
            InboundMessage::AttendanceEvent(e) => fold_attendance(entry, e),
            InboundMessage::PersonStatusUpdate(u) => fold_status_update(entry, u),
            _ => return None,
        };
        let status = entry.clone();
        state.last_applied.insert(person_id.clone(), event_timestamp);
        self.publish(&state.statuses);
        drop(state);

        self.metrics.record_event_applied();
        info!(
            person_id = %status.person_id,
            checked_in = status.checked_in,
            ?kind,
            "Applied attendance change"
        );

        Some(AppliedChange {
            kind,
            event_timestamp,
            duration_minutes,
            status,
        })
    }

    /// Subscribes the reconciler to the router's status messages.
    ///
    /// Every applied change is forwarded to `sink`, if given.
    pub fn attach(
        self: &Arc<Self>,
        router: &MessageRouter,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Vec<SubscriptionHandle> {
        let mut handles = Vec::with_capacity(3);

        for kind in [MessageKind::AttendanceEvent, MessageKind::PersonStatusUpdate] {
            let reconciler = Arc::clone(self);
            let sink = sink.clone();
            handles.push(router.on(kind, move |msg| {
                if let Some(change) = reconciler.apply_event(msg) {
                    if let Some(sink) = &sink {
                        sink.on_change(&change);
                    }
                }
                Ok(())
            }));
        }

        let reconciler = Arc::clone(self);
        handles.push(router.on(MessageKind::InitialStatus, move |msg| {
            if let InboundMessage::InitialStatus(initial) = msg {
                reconciler.apply_initial_status(initial);
            }
            Ok(())
        }));

        handles
    }

    /// Pulls a snapshot from `source` and applies it.
    ///
    /// # Errors
    ///
    /// Returns the source's error; the map is left unchanged.
    pub async fn refresh_from<S: SnapshotSource>(&self, source: &S) -> Result<usize, S::Error> {
        let statuses = source.fetch_snapshot().await?;
        Ok(self.apply_snapshot(statuses))
    }

    /// Returns the current map.
    #[must_use]
    pub fn status_map(&self) -> Arc<StatusMap> {
        Arc::clone(&self.published.borrow())
    }

    /// Returns one person's entry.
    #[must_use]
    pub fn status(&self, person_id: &str) -> Option<PersonStatus> {
        self.published.borrow().get(person_id).cloned()
    }

    /// Returns a receiver that changes whenever the map changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.published.subscribe()
    }

    /// Returns the number of persons currently checked in.
    #[must_use]
    pub fn checked_in_count(&self) -> usize {
        self.published
            .borrow()
            .values()
            .filter(|s| s.checked_in)
            .count()
    }
}

fn fold_attendance(entry: &mut PersonStatus, event: &AttendanceEvent) -> (ChangeKind, Option<i64>) {
    if !event.person_name.is_empty() {
        entry.person_name.clone_from(&event.person_name);
    }
    entry.last_detection_time = Some(event.timestamp);

    match event.action {
        AttendanceAction::CheckIn => {
            entry.checked_in = true;
            entry.check_in_time = Some(event.check_in_time.unwrap_or(event.timestamp));
            entry.current_duration_minutes = None;
            (ChangeKind::CheckIn, None)
        }
        AttendanceAction::CheckOut => {
            entry.checked_in = false;
            entry.check_in_time = None;
            entry.current_duration_minutes = event.duration_minutes;
            (ChangeKind::CheckOut, event.duration_minutes)
        }
    }
}

fn fold_status_update(
    entry: &mut PersonStatus,
    update: &PersonStatusUpdate,
) -> (ChangeKind, Option<i64>) {
    if !update.person_name.is_empty() {
        entry.person_name.clone_from(&update.person_name);
    }
    entry.checked_in = update.checked_in;
    entry.check_in_time = update.check_in_time;
    entry.current_duration_minutes = update.current_duration_minutes;
    (ChangeKind::StatusUpdate, None)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis).expect("timestamp")
    }

    fn reconciler() -> Arc<StateReconciler> {
        Arc::new(StateReconciler::new(Arc::new(FeedMetrics::new())))
    }

    fn attendance(person: &str, action: AttendanceAction, at: i64) -> InboundMessage {
        InboundMessage::AttendanceEvent(AttendanceEvent {
            event_timestamp: ts(at),
            person_id: person.to_string(),
            person_name: format!("Name {}", person),
            action,
            timestamp: ts(at),
            confidence: 0.9,
            attendance_id: None,
            check_in_time: None,
            check_out_time: None,
            duration_minutes: match action {
                AttendanceAction::CheckIn => None,
                AttendanceAction::CheckOut => Some(at / 10),
            },
        })
    }

    fn status_update(person: &str, checked_in: bool, at: i64) -> InboundMessage {
        InboundMessage::PersonStatusUpdate(PersonStatusUpdate {
            event_timestamp: ts(at),
            person_id: person.to_string(),
            person_name: String::new(),
            checked_in,
            check_in_time: checked_in.then(|| ts(at)),
            current_duration_minutes: None,
        })
    }

    #[test]
    fn test_check_in_then_stale_check_out() {
        let reconciler = reconciler();

        let change = reconciler
            .apply_event(&attendance("P1", AttendanceAction::CheckIn, 100))
            .expect("applied");
        assert_eq!(change.kind, ChangeKind::CheckIn);
        assert!(reconciler.status("P1").expect("entry").checked_in);

        assert!(reconciler
            .apply_event(&attendance("P1", AttendanceAction::CheckOut, 50))
            .is_none());

        let entry = reconciler.status("P1").expect("entry");
        assert!(entry.checked_in);
        assert_eq!(entry.check_in_time, Some(ts(100)));
        assert_eq!(reconciler.metrics.stale_events_dropped(), 1);
    }

    #[test]
    fn test_duplicate_timestamp_dropped() {
        let reconciler = reconciler();
        let event = attendance("P1", AttendanceAction::CheckIn, 100);

        assert!(reconciler.apply_event(&event).is_some());
        assert!(reconciler.apply_event(&event).is_none());
        assert_eq!(reconciler.metrics.events_applied(), 1);
    }

    #[test]
    fn test_check_out_records_duration() {
        let reconciler = reconciler();
        reconciler.apply_event(&attendance("P1", AttendanceAction::CheckIn, 100));
        let change = reconciler
            .apply_event(&attendance("P1", AttendanceAction::CheckOut, 450))
            .expect("applied");

        assert_eq!(change.kind, ChangeKind::CheckOut);
        assert_eq!(change.duration_minutes, Some(45));
        assert!(!change.status.checked_in);
        assert!(change.status.check_in_time.is_none());
        assert_eq!(change.status.current_duration_minutes, Some(45));
        assert_eq!(change.status.last_detection_time, Some(ts(450)));
    }

    #[test]
    fn test_event_order_converges() {
        let events = [
            attendance("P1", AttendanceAction::CheckIn, 100),
            attendance("P1", AttendanceAction::CheckOut, 200),
            attendance("P1", AttendanceAction::CheckIn, 300),
            attendance("P1", AttendanceAction::CheckOut, 400),
        ];
        let orders: [[usize; 4]; 6] = [
            [0, 1, 2, 3],
            [3, 2, 1, 0],
            [1, 3, 0, 2],
            [2, 0, 3, 1],
            [0, 3, 1, 2],
            [3, 0, 2, 1],
        ];

        let mut results = Vec::new();
        for order in orders {
            let reconciler = reconciler();
            for i in order {
                reconciler.apply_event(&events[i]);
            }
            results.push(reconciler.status("P1").expect("entry"));
        }

        for result in &results {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(results[0].current_duration_minutes, Some(40));
    }

    #[test]
    fn test_snapshot_then_newer_push_update() {
        let reconciler = reconciler();
        reconciler.apply_snapshot(vec![PersonStatus::new("P2", "Bob")]);
        assert!(!reconciler.status("P2").expect("entry").checked_in);

        reconciler
            .apply_event(&status_update("P2", true, 500))
            .expect("applied");

        let entry = reconciler.status("P2").expect("entry");
        assert!(entry.checked_in);
        assert_eq!(entry.person_name, "Bob");
    }

    #[test]
    fn test_snapshot_keeps_last_applied() {
        let reconciler = reconciler();
        reconciler.apply_event(&attendance("P1", AttendanceAction::CheckIn, 100));

        reconciler.apply_snapshot(vec![PersonStatus::new("P1", "Ada")]);
        assert!(!reconciler.status("P1").expect("entry").checked_in);

        assert!(reconciler
            .apply_event(&attendance("P1", AttendanceAction::CheckIn, 90))
            .is_none());
        assert!(reconciler
            .apply_event(&attendance("P1", AttendanceAction::CheckIn, 150))
            .is_some());
    }

    #[test]
    fn test_snapshot_retains_unlisted_persons() {
        let reconciler = reconciler();
        reconciler.apply_snapshot(vec![
            PersonStatus::new("P1", "Ada"),
            PersonStatus::new("P2", "Bob"),
        ]);
        reconciler.apply_snapshot(vec![PersonStatus::new("P1", "Ada")
            .with_check_in(ts(10))]);

        let map = reconciler.status_map();
        assert_eq!(map.len(), 2);
        assert!(map["P1"].checked_in);
        assert_eq!(reconciler.checked_in_count(), 1);
    }

    #[test]
    fn test_initial_status_keeps_name() {
        let reconciler = reconciler();
        reconciler.apply_snapshot(vec![PersonStatus::new("P3", "Cleo")]);

        reconciler.apply_initial_status(&InitialStatus {
            person_id: "P3".to_string(),
            checked_in: true,
            check_in_time: Some(ts(42)),
            current_duration_minutes: Some(5),
        });

        let entry = reconciler.status("P3").expect("entry");
        assert_eq!(entry.person_name, "Cleo");
        assert!(entry.checked_in);
        assert_eq!(entry.current_duration_minutes, Some(5));
    }

    #[test]
    fn test_non_status_message_ignored() {
        let reconciler = reconciler();
        assert!(reconciler.apply_event(&InboundMessage::Ping).is_none());
        assert!(reconciler.status_map().is_empty());
    }

    #[test]
    fn test_watch_changes_only_on_change() {
        let reconciler = reconciler();
        let mut rx = reconciler.watch();

        reconciler.apply_snapshot(vec![PersonStatus::new("P1", "Ada")]);
        assert!(rx.has_changed().expect("watch"));
        rx.borrow_and_update();

        reconciler.apply_snapshot(vec![PersonStatus::new("P1", "Ada")]);
        assert!(!rx.has_changed().expect("watch"));

        let before = reconciler.status_map();
        reconciler.apply_event(&attendance("P1", AttendanceAction::CheckIn, 1));
        assert!(rx.has_changed().expect("watch"));
        assert!(!before["P1"].checked_in);
    }

    struct CountingSink(AtomicUsize);

    impl ChangeSink for CountingSink {
        fn on_change(&self, _change: &AppliedChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_attach_routes_events_to_sink() {
        let metrics = Arc::new(FeedMetrics::new());
        let router = MessageRouter::new(Arc::clone(&metrics));
        let reconciler = Arc::new(StateReconciler::new(metrics));
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));

        let handles = reconciler.attach(&router, Some(sink.clone() as Arc<dyn ChangeSink>));
        assert_eq!(handles.len(), 3);

        router.route(
            r#"{"type":"attendance_event","event_timestamp":100,"person_id":"P1","person_name":"Ada","action":"check_in","timestamp":100,"confidence":0.9}"#,
        );
        router.route(
            r#"{"type":"attendance_event","event_timestamp":50,"person_id":"P1","person_name":"Ada","action":"check_out","timestamp":50,"confidence":0.9}"#,
        );
        router.route(r#"{"type":"initial_status","person_id":"P2","checked_in":true}"#);

        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(reconciler.status("P1").expect("P1").checked_in);
        assert!(reconciler.status("P2").expect("P2").checked_in);

        for handle in &handles {
            assert!(handle.unsubscribe());
        }
        router.route(
            r#"{"type":"attendance_event","event_timestamp":300,"person_id":"P1","action":"check_out","timestamp":300,"confidence":0.9}"#,
        );
        assert!(reconciler.status("P1").expect("P1").checked_in);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("snapshot unavailable: {0}")]
    struct SourceError(String);

    struct FixedSource(Result<Vec<PersonStatus>, String>);

    impl SnapshotSource for FixedSource {
        type Error = SourceError;

        async fn fetch_snapshot(&self) -> Result<Vec<PersonStatus>, SourceError> {
            self.0.clone().map_err(SourceError)
        }
    }

    #[tokio::test]
    async fn test_refresh_from_applies_snapshot() {
        let reconciler = reconciler();
        let source = FixedSource(Ok(vec![
            PersonStatus::new("P1", "Ada"),
            PersonStatus::new("P2", "Bob").with_check_in(ts(7)),
        ]));

        let applied = reconciler.refresh_from(&source).await.expect("refresh");
        assert_eq!(applied, 2);
        assert_eq!(reconciler.checked_in_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_map() {
        let reconciler = reconciler();
        reconciler.apply_snapshot(vec![PersonStatus::new("P1", "Ada").with_check_in(ts(7))]);

        let err = reconciler
            .refresh_from(&FixedSource(Err("offline".to_string())))
            .await
            .expect_err("refresh fails");
        assert_eq!(err.to_string(), "snapshot unavailable: offline");
        assert!(reconciler.status("P1").expect("entry").checked_in);
    }
}
