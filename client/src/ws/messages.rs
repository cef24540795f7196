//! WebSocket message types.
//!
//! Defines the wire messages of the attendance feed. Every message is a JSON
//! object tagged by its `type` field.

use serde::{Deserialize, Serialize};

use super::error::WsError;
use crate::types::Timestamp;

/// Kind of an inbound message, as named by its `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Server greeting after the socket is accepted.
    ConnectionEstablished,
    /// Current status of the filtered person, sent once after connecting.
    InitialStatus,
    /// Check-in or check-out.
    AttendanceEvent,
    /// Status change of a person.
    PersonStatusUpdate,
    /// Raw recognition event.
    DetectionEvent,
    /// Acknowledgement of a subscription change.
    SubscriptionUpdated,
    /// Server is about to close the connection.
    Disconnecting,
    /// Keepalive request.
    Ping,
    /// Keepalive reply.
    Pong,
    /// Server-side error.
    Error,
}

impl MessageKind {
    /// Every message kind.
    pub const ALL: [Self; 10] = [
        Self::ConnectionEstablished,
        Self::InitialStatus,
        Self::AttendanceEvent,
        Self::PersonStatusUpdate,
        Self::DetectionEvent,
        Self::SubscriptionUpdated,
        Self::Disconnecting,
        Self::Ping,
        Self::Pong,
        Self::Error,
    ];

    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionEstablished => "connection_established",
            Self::InitialStatus => "initial_status",
            Self::AttendanceEvent => "attendance_event",
            Self::PersonStatusUpdate => "person_status_update",
            Self::DetectionEvent => "detection_event",
            Self::SubscriptionUpdated => "subscription_updated",
            Self::Disconnecting => "disconnecting",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance action carried by an [`AttendanceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceAction {
    /// Person arrived.
    CheckIn,
    /// Person left.
    CheckOut,
}

impl std::fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckIn => write!(f, "check_in"),
            Self::CheckOut => write!(f, "check_out"),
        }
    }
}

/// Server greeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    /// Client identity echoed by the server.
    pub client_id: String,
    /// Server time.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// Person id or `all`.
    #[serde(default)]
    pub subscribed_to: Option<String>,
    /// Confidence threshold applied by the server.
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

/// Current status of the filtered person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialStatus {
    /// Person ID.
    pub person_id: String,
    /// Whether the person is checked in.
    pub checked_in: bool,
    /// Time of the current check-in.
    #[serde(default)]
    pub check_in_time: Option<Timestamp>,
    /// Minutes since check-in.
    #[serde(default)]
    pub current_duration_minutes: Option<i64>,
}

/// A check-in or check-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Server-assigned ordering timestamp, monotonic per person.
    pub event_timestamp: Timestamp,
    /// Person ID.
    pub person_id: String,
    /// Person display name.
    #[serde(default)]
    pub person_name: String,
    /// What happened.
    pub action: AttendanceAction,
    /// Recognition time.
    pub timestamp: Timestamp,
    /// Recognition confidence (0.0 to 1.0).
    pub confidence: f64,
    /// Attendance record ID.
    #[serde(default)]
    pub attendance_id: Option<String>,
    /// Check-in time for `check_in`.
    #[serde(default)]
    pub check_in_time: Option<Timestamp>,
    /// Check-out time for `check_out`.
    #[serde(default)]
    pub check_out_time: Option<Timestamp>,
    /// Stay duration computed by the server for `check_out`.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// Status change of a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonStatusUpdate {
    /// Server-assigned ordering timestamp, monotonic per person.
    pub event_timestamp: Timestamp,
    /// Person ID.
    pub person_id: String,
    /// Person display name.
    #[serde(default)]
    pub person_name: String,
    /// Whether the person is checked in.
    pub checked_in: bool,
    /// Time of the current check-in.
    #[serde(default)]
    pub check_in_time: Option<Timestamp>,
    /// Minutes since check-in.
    #[serde(default)]
    pub current_duration_minutes: Option<i64>,
}

/// Raw recognition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Server-assigned ordering timestamp.
    #[serde(default)]
    pub event_timestamp: Option<Timestamp>,
    /// Recognised person, if any.
    #[serde(default)]
    pub person_id: Option<String>,
    /// Recognised person's name.
    #[serde(default)]
    pub person_name: Option<String>,
    /// Camera that produced the detection.
    #[serde(default)]
    pub camera_id: Option<String>,
    /// Recognition confidence.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Detection time.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Server greeting.
    ConnectionEstablished(ConnectionEstablished),
    /// Current status of the filtered person.
    InitialStatus(InitialStatus),
    /// Check-in or check-out.
    AttendanceEvent(AttendanceEvent),
    /// Status change of a person.
    PersonStatusUpdate(PersonStatusUpdate),
    /// Raw recognition event.
    DetectionEvent(DetectionEvent),
    /// Subscription change acknowledged.
    SubscriptionUpdated {
        /// Person id or `all`.
        #[serde(default)]
        new_subscription: Option<String>,
        /// Server time.
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Server is closing the connection.
    Disconnecting {
        /// Close reason.
        #[serde(default)]
        reason: Option<String>,
        /// Server time.
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
    /// Keepalive request.
    Ping,
    /// Keepalive reply.
    Pong,
    /// Server-side error.
    Error {
        /// Error code.
        #[serde(default)]
        code: Option<String>,
        /// Error message.
        #[serde(default)]
        message: Option<String>,
    },
}

impl InboundMessage {
    /// Parses a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns `WsError::Deserialization` for malformed JSON or an unknown
    /// `type`.
    pub fn parse(raw: &str) -> Result<Self, WsError> {
        serde_json::from_str(raw).map_err(|e| WsError::Deserialization(e.to_string()))
    }

    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ConnectionEstablished(_) => MessageKind::ConnectionEstablished,
            Self::InitialStatus(_) => MessageKind::InitialStatus,
            Self::AttendanceEvent(_) => MessageKind::AttendanceEvent,
            Self::PersonStatusUpdate(_) => MessageKind::PersonStatusUpdate,
            Self::DetectionEvent(_) => MessageKind::DetectionEvent,
            Self::SubscriptionUpdated { .. } => MessageKind::SubscriptionUpdated,
            Self::Disconnecting { .. } => MessageKind::Disconnecting,
            Self::Ping => MessageKind::Ping,
            Self::Pong => MessageKind::Pong,
            Self::Error { .. } => MessageKind::Error,
        }
    }

    /// Returns the ordering timestamp of domain events.
    #[must_use]
    pub fn event_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::AttendanceEvent(e) => Some(e.event_timestamp),
            Self::PersonStatusUpdate(u) => Some(u.event_timestamp),
            Self::DetectionEvent(d) => d.event_timestamp,
            _ => None,
        }
    }

    /// Returns the person the message is about, if any.
    #[must_use]
    pub fn person_id(&self) -> Option<&str> {
        match self {
            Self::InitialStatus(s) => Some(&s.person_id),
            Self::AttendanceEvent(e) => Some(&e.person_id),
            Self::PersonStatusUpdate(u) => Some(&u.person_id),
            Self::DetectionEvent(d) => d.person_id.as_deref(),
            _ => None,
        }
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Scope server-side push traffic.
    Subscribe {
        /// Person to follow (None = all persons).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        person_id: Option<String>,
        /// Minimum confidence threshold.
        min_confidence: f64,
    },
    /// Ask the server to end the session.
    Unsubscribe,
    /// Keepalive reply.
    Pong,
}

impl OutboundMessage {
    /// Creates a subscribe message.
    #[must_use]
    pub fn subscribe(person_id: Option<String>, min_confidence: f64) -> Self {
        Self::Subscribe {
            person_id,
            min_confidence,
        }
    }

    /// Returns the wire name of this message.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Pong => "pong",
        }
    }
}
