//! Monitor configuration.
//!
//! Loaded from `ATTENDANCE_*` environment variables and converted into the
//! client's WebSocket and REST configurations.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use attendance_client::rest::config::DEFAULT_BASE_URL;
use attendance_client::ws::config::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_WS_URL,
    MAX_RECONNECT_DELAY_MS,
};
use attendance_client::{RestConfig, WsConfig};
use serde::{Deserialize, Serialize};

/// REST API base URL.
pub const ENV_API_URL: &str = "ATTENDANCE_API_URL";
/// WebSocket base URL.
pub const ENV_WS_URL: &str = "ATTENDANCE_WS_URL";
/// Bearer token for the REST API.
pub const ENV_API_TOKEN: &str = "ATTENDANCE_API_TOKEN";
/// Person filter for the live feed.
pub const ENV_PERSON_ID: &str = "ATTENDANCE_PERSON_ID";
/// Minimum recognition confidence.
pub const ENV_MIN_CONFIDENCE: &str = "ATTENDANCE_MIN_CONFIDENCE";
/// Snapshot poll interval in seconds.
pub const ENV_POLL_INTERVAL_SECS: &str = "ATTENDANCE_POLL_INTERVAL_SECS";
/// Snapshot poll interval in seconds while the live feed is down.
pub const ENV_FALLBACK_POLL_INTERVAL_SECS: &str = "ATTENDANCE_FALLBACK_POLL_INTERVAL_SECS";
/// Quiet period before a requested summary refresh runs.
pub const ENV_SUMMARY_DEBOUNCE_MS: &str = "ATTENDANCE_SUMMARY_DEBOUNCE_MS";
/// First reconnect delay.
pub const ENV_RECONNECT_BASE_MS: &str = "ATTENDANCE_RECONNECT_BASE_MS";
/// Reconnect delay cap.
pub const ENV_RECONNECT_MAX_MS: &str = "ATTENDANCE_RECONNECT_MAX_MS";
/// Reconnect attempts before giving up.
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "ATTENDANCE_RECONNECT_MAX_ATTEMPTS";

/// Default snapshot poll interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default poll interval while offline.
pub const DEFAULT_FALLBACK_POLL_INTERVAL_SECS: u64 = 15;

/// Default summary debounce window.
pub const DEFAULT_SUMMARY_DEBOUNCE_MS: u64 = 500;

/// Configuration for the monitor service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// REST API base URL.
    pub api_url: String,

    /// WebSocket base URL.
    pub ws_url: String,

    /// Bearer token for the REST API.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    /// Only follow this person, if set.
    pub person_id: Option<String>,

    /// Minimum recognition confidence for pushed events.
    pub min_confidence: f64,

    /// Snapshot poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Snapshot poll interval in seconds once the live feed gave up.
    pub fallback_poll_interval_secs: u64,

    /// Summary refresh debounce in milliseconds.
    pub summary_debounce_ms: u64,

    /// First reconnect delay in milliseconds.
    pub reconnect_base_ms: u64,

    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_ms: u64,

    /// Reconnect attempts before giving up.
    pub reconnect_max_attempts: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            api_token: None,
            person_id: None,
            min_confidence: 0.0,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            fallback_poll_interval_secs: DEFAULT_FALLBACK_POLL_INTERVAL_SECS,
            summary_debounce_ms: DEFAULT_SUMMARY_DEBOUNCE_MS,
            reconnect_base_ms: DEFAULT_RECONNECT_DELAY_MS,
            reconnect_max_ms: MAX_RECONNECT_DELAY_MS,
            reconnect_max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl MonitorConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            api_url: lookup(ENV_API_URL).unwrap_or(defaults.api_url),
            ws_url: lookup(ENV_WS_URL).unwrap_or(defaults.ws_url),
            api_token: lookup(ENV_API_TOKEN),
            person_id: lookup(ENV_PERSON_ID),
            min_confidence: parse(&lookup, ENV_MIN_CONFIDENCE)?
                .unwrap_or(defaults.min_confidence),
            poll_interval_secs: parse(&lookup, ENV_POLL_INTERVAL_SECS)?
                .unwrap_or(defaults.poll_interval_secs),
            fallback_poll_interval_secs: parse(&lookup, ENV_FALLBACK_POLL_INTERVAL_SECS)?
                .unwrap_or(defaults.fallback_poll_interval_secs),
            summary_debounce_ms: parse(&lookup, ENV_SUMMARY_DEBOUNCE_MS)?
                .unwrap_or(defaults.summary_debounce_ms),
            reconnect_base_ms: parse(&lookup, ENV_RECONNECT_BASE_MS)?
                .unwrap_or(defaults.reconnect_base_ms),
            reconnect_max_ms: parse(&lookup, ENV_RECONNECT_MAX_MS)?
                .unwrap_or(defaults.reconnect_max_ms),
            reconnect_max_attempts: parse(&lookup, ENV_RECONNECT_MAX_ATTEMPTS)?
                .unwrap_or(defaults.reconnect_max_attempts),
        };

        config.validate()?;
        Ok(config)
    }

    /// Sets the snapshot poll intervals.
    #[must_use]
    pub fn with_poll_intervals(mut self, poll_secs: u64, fallback_secs: u64) -> Self {
        self.poll_interval_secs = poll_secs;
        self.fallback_poll_interval_secs = fallback_secs;
        self
    }

    /// Sets the summary debounce window.
    #[must_use]
    pub fn with_summary_debounce(mut self, ms: u64) -> Self {
        self.summary_debounce_ms = ms;
        self
    }

    /// Sets the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, base_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        self.reconnect_base_ms = base_ms;
        self.reconnect_max_ms = max_ms;
        self.reconnect_max_attempts = max_attempts;
        self
    }

    /// Returns the regular poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the offline poll interval.
    #[must_use]
    pub const fn fallback_poll_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_interval_secs)
    }

    /// Returns the summary debounce window.
    #[must_use]
    pub const fn summary_debounce(&self) -> Duration {
        Duration::from_millis(self.summary_debounce_ms)
    }

    /// Builds the live feed configuration.
    #[must_use]
    pub fn ws_config(&self) -> WsConfig {
        let config = WsConfig::new(self.ws_url.clone())
            .with_reconnect_delay(Duration::from_millis(self.reconnect_base_ms))
            .with_max_reconnect_delay(Duration::from_millis(self.reconnect_max_ms))
            .with_max_reconnect_attempts(self.reconnect_max_attempts)
            .with_min_confidence(self.min_confidence);

        match &self.person_id {
            Some(person_id) => config.with_person_filter(person_id.clone()),
            None => config,
        }
    }

    /// Builds the REST client configuration.
    #[must_use]
    pub fn rest_config(&self) -> RestConfig {
        let config = RestConfig::new(self.api_url.clone());
        match &self.api_token {
            Some(token) => config.with_api_token(token.clone()),
            None => config,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.fallback_poll_interval_secs == 0
            || self.fallback_poll_interval_secs > self.poll_interval_secs
        {
            return Err(ConfigError::InvalidFallbackPollInterval);
        }

        self.ws_config()
            .validate()
            .map_err(|e| ConfigError::InvalidFeed(e.to_string()))?;

        self.rest_config()
            .validate()
            .map_err(|e| ConfigError::InvalidApi(e.to_string()))?;

        Ok(())
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            })
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// Invalid poll interval.
    #[error("poll_interval_secs must be > 0")]
    InvalidPollInterval,

    /// Invalid fallback poll interval.
    #[error("fallback_poll_interval_secs must be > 0 and <= poll_interval_secs")]
    InvalidFallbackPollInterval,

    /// The derived live feed configuration is invalid.
    #[error("invalid live feed configuration: {0}")]
    InvalidFeed(String),

    /// The derived REST configuration is invalid.
    #[error("invalid api configuration: {0}")]
    InvalidApi(String),
}
