//! REST client configuration.

use std::time::Duration;

use super::error::RestError;

/// Default base URL for the API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Default ceiling for the retry delay, in milliseconds.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Default page size for the persons listing. The backend caps it at 100.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default number of status requests in flight while building a snapshot.
pub const DEFAULT_SNAPSHOT_CONCURRENCY: usize = 8;

/// REST client configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum number of retries for transient failures.
    pub max_retries: u32,

    /// Delay before the first retry. Doubles per retry.
    pub retry_delay: Duration,

    /// Ceiling for the retry delay.
    pub max_retry_delay: Duration,

    /// Optional bearer token.
    pub api_token: Option<String>,

    /// User agent string.
    pub user_agent: String,

    /// Page size used when listing persons.
    pub page_size: u32,

    /// Status requests in flight while building a snapshot.
    pub snapshot_concurrency: usize,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_retry_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
            api_token: None,
            user_agent: format!("attendance-client/{}", env!("CARGO_PKG_VERSION")),
            page_size: DEFAULT_PAGE_SIZE,
            snapshot_concurrency: DEFAULT_SNAPSHOT_CONCURRENCY,
        }
    }
}

impl RestConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the retry delay schedule.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration, max_delay: Duration) -> Self {
        self.retry_delay = delay;
        self.max_retry_delay = max_delay;
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the persons listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets how many status requests run at once while building a snapshot.
    #[must_use]
    pub fn with_snapshot_concurrency(mut self, concurrency: usize) -> Self {
        self.snapshot_concurrency = concurrency;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), RestError> {
        if self.base_url.is_empty() {
            return Err(RestError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RestError::InvalidConfig(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(RestError::InvalidConfig(format!(
                "max_retries must be <= {}",
                MAX_RETRIES_LIMIT
            )));
        }

        if self.retry_delay > self.max_retry_delay {
            return Err(RestError::InvalidConfig(
                "retry_delay must be <= max_retry_delay".to_string(),
            ));
        }

        if !(1..=100).contains(&self.page_size) {
            return Err(RestError::InvalidConfig(
                "page_size must be within 1..=100".to_string(),
            ));
        }

        if self.snapshot_concurrency == 0 {
            return Err(RestError::InvalidConfig(
                "snapshot_concurrency must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
