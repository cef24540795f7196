//! Attendance client - real-time attendance feed for the recognition backend.
//!
//! This crate keeps a live view of who is checked in. Events pushed by the
//! backend over WebSocket are merged with REST snapshots into one status map.
//!
//! # Components
//!
//! - [`ws::ConnectionManager`]: one live connection with exponential-backoff
//!   reconnection
//! - [`ws::MessageRouter`]: typed dispatch of inbound frames by kind
//! - [`reconcile::StateReconciler`]: the status map and its ordering rule
//! - [`effects::SideEffectBridge`]: notifications and summary refreshes
//! - [`rest::AttendanceRestClient`]: snapshot and summary endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use attendance_client::reconcile::StateReconciler;
//! use attendance_client::rest::{AttendanceRestClient, RestConfig};
//! use attendance_client::ws::{ConnectionManager, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(WsConfig::default())?;
//!     let reconciler = Arc::new(StateReconciler::new(Arc::clone(manager.metrics())));
//!     reconciler.attach(manager.router(), None);
//!
//!     let rest = AttendanceRestClient::new(RestConfig::default())?;
//!     reconciler.refresh_from(&rest).await?;
//!     manager.connect().await;
//!
//!     println!("{} checked in", reconciler.checked_in_count());
//!     Ok(())
//! }
//! ```

pub mod effects;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod rest;
pub mod types;
pub mod ws;

pub use effects::{Notification, NotificationLevel, Notifier, RefreshScheduler, SideEffectBridge};
pub use error::AttendanceError;
pub use metrics::{FeedMetrics, FeedMetricsSnapshot};
pub use reconcile::{AppliedChange, ChangeKind, ChangeSink, SnapshotSource, StateReconciler};
pub use rest::{AttendanceRestClient, RestConfig, RestError};
pub use types::{
    ClientIdentity, DailySummary, PageMeta, PersonRecord, PersonStatus, PersonsPage, StatusMap,
    Timestamp,
};
pub use ws::{
    ConnectionManager, ConnectionState, InboundMessage, MessageKind, MessageRouter,
    OutboundMessage, WsConfig, WsError,
};
