//! Primitive types for the attendance client.
//!
//! Provides the ordered [`Timestamp`] used for event bookkeeping and the
//! per-connection [`ClientIdentity`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AttendanceError;

/// Naive formats accepted when the server omits a UTC offset.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Length of the random suffix of a client identity.
const IDENTITY_SUFFIX_LEN: usize = 9;

/// A UTC instant.
///
/// The backend emits ISO-8601 strings without an offset, so those are read as
/// UTC. RFC 3339 strings and integer milliseconds since the Unix epoch are
/// accepted as well. Always serialized as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp from a UTC datetime.
    #[must_use]
    pub const fn new(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    /// Returns the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns `AttendanceError::TimestampOutOfRange` if the value cannot be
    /// represented.
    pub fn from_millis(millis: i64) -> Result<Self, AttendanceError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or(AttendanceError::TimestampOutOfRange(millis))
    }

    /// Parses an RFC 3339 or offset-less ISO-8601 string.
    ///
    /// # Errors
    ///
    /// Returns `AttendanceError::InvalidTimestamp` if no format matches.
    pub fn parse(value: &str) -> Result<Self, AttendanceError> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(|naive| Self(naive.and_utc()))
            .ok_or_else(|| AttendanceError::InvalidTimestamp(value.to_string()))
    }

    /// Returns the underlying datetime.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl FromStr for Timestamp {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl Visitor<'_> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ISO-8601 string or milliseconds since the Unix epoch")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Timestamp::parse(value).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Timestamp::from_millis(value).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        let millis = i64::try_from(value)
            .map_err(|_| E::custom(AttendanceError::TimestampOutOfRange(i64::MAX)))?;
        self.visit_i64(millis)
    }
}

/// Opaque identity of one client session.
///
/// Generated once per connection manager as `client_{unix_millis}_{suffix}`;
/// the server scopes subscriptions by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generates a new identity from the current time and a random suffix.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Timestamp::now())
    }

    /// Generates a new identity for the given creation time.
    #[must_use]
    pub fn generate_at(now: Timestamp) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(IDENTITY_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();

        Self(format!("client_{}_{}", now.timestamp_millis(), suffix))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
