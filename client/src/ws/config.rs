//! WebSocket configuration.
//!
//! Provides configuration options for the live feed connection.

use std::time::Duration;

use super::error::WsError;
use crate::types::ClientIdentity;

/// Default WebSocket base URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/api/v1/attendance";

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Default maximum reconnect delay in milliseconds.
pub const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default maximum reconnection attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// WebSocket configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WsConfig {
    /// Base URL; the client appends `/ws/{client_id}`.
    pub url: String,

    /// Delay before the first reconnection attempt.
    pub reconnect_delay: Duration,

    /// Upper bound for the reconnection delay.
    pub max_reconnect_delay: Duration,

    /// Reconnection attempts before the connection gives up.
    pub max_reconnect_attempts: u32,

    /// Only receive events for this person (None = all persons).
    pub person_id: Option<String>,

    /// Only receive events with at least this recognition confidence.
    pub min_confidence: f64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(MAX_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            person_id: None,
            min_confidence: 0.0,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Restricts the feed to one person.
    #[must_use]
    pub fn with_person_filter(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    /// Sets the minimum confidence threshold.
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Returns the connection URL for the given client identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed.
    pub fn connection_url(&self, client: &ClientIdentity) -> Result<String, WsError> {
        let base = self.url.trim_end_matches('/');
        let mut url = reqwest::Url::parse(&format!("{}/ws/{}", base, client))
            .map_err(|e| WsError::InvalidConfig(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(person_id) = &self.person_id {
                query.append_pair("person_id", person_id);
            }
            query.append_pair("min_confidence", &self.min_confidence.to_string());
        }

        Ok(url.to_string())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.url.is_empty() {
            return Err(WsError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay must be >= reconnect_delay".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(WsError::InvalidConfig(
                "min_confidence must be within 0.0..=1.0".to_string(),
            ));
        }

        Ok(())
    }
}
