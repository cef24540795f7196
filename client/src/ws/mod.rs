//! Live attendance feed over WebSocket.
//!
//! The [`ConnectionManager`] keeps one connection to the backend's attendance
//! feed alive, reconnecting with exponential backoff, and hands every parsed
//! frame to its [`MessageRouter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use attendance_client::ws::{ConnectionManager, MessageKind, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(WsConfig::new("ws://localhost:8000/api/v1/attendance"))?;
//!
//!     manager.router().on(MessageKind::AttendanceEvent, |msg| {
//!         println!("Received: {:?}", msg);
//!         Ok(())
//!     });
//!
//!     manager.connect().await;
//!     println!("state: {}", manager.state());
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod router;
pub mod state;
pub mod timer;
pub mod transport;

pub use backoff::Backoff;
pub use config::WsConfig;
pub use connection::ConnectionManager;
pub use error::WsError;
pub use messages::{
    AttendanceAction, AttendanceEvent, ConnectionEstablished, DetectionEvent, InboundMessage,
    InitialStatus, MessageKind, OutboundMessage, PersonStatusUpdate,
};
pub use router::{Handler, HandlerError, MessageRouter, SubscriptionHandle, SubscriptionRegistry};
pub use state::ConnectionState;
pub use timer::ScheduledTask;
pub use transport::{Connector, TransportEvent, TransportLink, TransportPeer, TungsteniteConnector};
