//! Person attendance status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::primitives::Timestamp;

/// Local view of every known person's status, keyed by person id.
pub type StatusMap = BTreeMap<String, PersonStatus>;

/// Current check-in status of one person.
///
/// Same shape as the per-person status endpoint of the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonStatus {
    /// Person ID.
    pub person_id: String,

    /// Display name. Empty when the source did not provide one.
    #[serde(default)]
    pub person_name: String,

    /// Whether the person is currently checked in.
    pub checked_in: bool,

    /// Time of the current check-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<Timestamp>,

    /// Minutes since check-in, or the final duration after a check-out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_duration_minutes: Option<i64>,

    /// Time of the last recognition that produced an event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_detection_time: Option<Timestamp>,

    /// Camera location of the last recognition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_detection_location: Option<String>,
}

impl PersonStatus {
    /// Creates a checked-out status with no history.
    #[must_use]
    pub fn new(person_id: impl Into<String>, person_name: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            person_name: person_name.into(),
            checked_in: false,
            check_in_time: None,
            current_duration_minutes: None,
            last_detection_time: None,
            last_detection_location: None,
        }
    }

    /// Returns a checked-in copy of this status.
    #[must_use]
    pub fn with_check_in(mut self, at: Timestamp) -> Self {
        self.checked_in = true;
        self.check_in_time = Some(at);
        self
    }

    /// Returns the display name, falling back to the person id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.person_name.is_empty() {
            &self.person_id
        } else {
            &self.person_name
        }
    }
}
