//! HTTP client implementation.
//!
//! Provides the client for the attendance REST endpoints the live feed is
//! reconciled against.

use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::config::RestConfig;
use super::error::RestError;
use crate::reconcile::SnapshotSource;
use crate::types::{DailySummary, PageMeta, PersonRecord, PersonStatus, PersonsPage};
use crate::ws::Backoff;

/// Success envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Paginated success envelope.
#[derive(Debug, Deserialize)]
struct PageEnvelope<T> {
    data: Vec<T>,
    meta: PageMeta,
}

/// HTTP client for the attendance REST API.
#[derive(Debug, Clone)]
pub struct AttendanceRestClient {
    config: RestConfig,
    http: reqwest::Client,
}

impl AttendanceRestClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RestError::InvalidConfig(format!("api_token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(RestError::Request)?;

        Ok(Self { config, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, RestError> {
        Self::new(RestConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, RestError> {
        Self::new(RestConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Builds the URL for a path below the base URL.
    fn url(&self, path: &str) -> Result<Url, RestError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
            .map_err(|e| RestError::InvalidConfig(e.to_string()))
    }

    /// Makes a GET request, retrying transient failures.
    ///
    /// Retries wait on the configured exponential schedule. A 429 with a
    /// `Retry-After` header waits the advertised seconds instead.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RestError> {
        let mut backoff = Backoff::new(
            self.config.retry_delay,
            self.config.max_retry_delay,
            self.config.max_retries,
        );

        loop {
            debug!(url = %url, "GET");
            let error = match self.http.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| RestError::Deserialization(e.to_string()))?;
                    return serde_json::from_str(&body)
                        .map_err(|e| RestError::Deserialization(e.to_string()));
                }
                Ok(resp) => error_from_response(&url, resp).await,
                Err(e) => RestError::from(e),
            };

            if !error.is_transient() {
                return Err(error);
            }
            let Some((attempt, delay)) = backoff.next_attempt() else {
                warn!(url = %url, error = %error, "Retries exhausted");
                return Err(error);
            };
            let delay = match error {
                RestError::RateLimited {
                    retry_after: Some(secs),
                } => Duration::from_secs(secs),
                _ => delay,
            };

            debug!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Gets the daily attendance summary.
    ///
    /// # Arguments
    ///
    /// * `date` - Day to summarise (default: today, server time)
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_daily_summary(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<DailySummary, RestError> {
        let mut url = self.url("/attendance/reports/daily")?;
        if let Some(date) = date {
            url.query_pairs_mut()
                .append_pair("date", &date.format("%Y-%m-%d").to_string());
        }
        let response: Envelope<DailySummary> = self.get(url).await?;
        Ok(response.data)
    }

    /// Gets the current check-in status of a person.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the person is not found.
    pub async fn get_person_status(&self, person_id: &str) -> Result<PersonStatus, RestError> {
        let mut url = self.url("/attendance/status")?;
        url.path_segments_mut()
            .map_err(|()| RestError::InvalidConfig("base_url cannot be a base".to_string()))?
            .push(person_id);
        let response: Envelope<PersonStatus> = self.get(url).await?;
        Ok(response.data)
    }

    /// Gets one page of the persons listing.
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `page_size` - Persons per page (max: 100)
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_persons(&self, page: u32, page_size: u32) -> Result<PersonsPage, RestError> {
        let mut url = self.url("/persons")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        let response: PageEnvelope<PersonRecord> = self.get(url).await?;
        Ok(PersonsPage {
            persons: response.data,
            meta: response.meta,
        })
    }

    /// Gets every person, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_all_persons(&self) -> Result<Vec<PersonRecord>, RestError> {
        let mut persons = Vec::new();
        let mut page = 1;

        loop {
            let result = self.list_persons(page, self.config.page_size).await?;
            let done = result.persons.is_empty() || !result.meta.has_more();
            persons.extend(result.persons);
            if done {
                break;
            }
            page += 1;
        }

        Ok(persons)
    }

    /// Builds a status snapshot of every active person.
    ///
    /// Names missing from the status endpoint are filled in from the
    /// persons listing.
    ///
    /// # Errors
    ///
    /// Returns the first error of any underlying request.
    pub async fn fetch_status_snapshot(&self) -> Result<Vec<PersonStatus>, RestError> {
        let persons: Vec<PersonRecord> = self
            .list_all_persons()
            .await?
            .into_iter()
            .filter(PersonRecord::is_active)
            .collect();

        let statuses: Vec<PersonStatus> = stream::iter(persons)
            .map(|person| async move {
                let mut status = self.get_person_status(&person.id).await?;
                if status.person_name.is_empty() {
                    status.person_name = person.full_name();
                }
                Ok::<_, RestError>(status)
            })
            .buffered(self.config.snapshot_concurrency)
            .try_collect()
            .await?;

        debug!(persons = statuses.len(), "Fetched status snapshot");
        Ok(statuses)
    }
}

impl SnapshotSource for AttendanceRestClient {
    type Error = RestError;

    async fn fetch_snapshot(&self) -> Result<Vec<PersonStatus>, RestError> {
        self.fetch_status_snapshot().await
    }
}

/// Reads a non-success response into an error.
async fn error_from_response(url: &Url, resp: reqwest::Response) -> RestError {
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());
    let body = resp.text().await.unwrap_or_default();
    RestError::from_response(status, url.path(), retry_after, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let config = RestConfig::new("https://api.example.com/api/v1");
        let client = AttendanceRestClient::new(config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_defaults() {
        let client = AttendanceRestClient::with_defaults();
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_invalid_config() {
        let client = AttendanceRestClient::new(RestConfig::new(""));
        assert!(client.is_err());
    }

    #[test]
    fn test_client_invalid_token() {
        let config = RestConfig::default().with_api_token("bad\ntoken");
        let client = AttendanceRestClient::new(config);
        assert!(matches!(client, Err(RestError::InvalidConfig(_))));
    }

    #[test]
    fn test_client_config_access() {
        let config = RestConfig::new("https://api.example.com").with_api_token("test-token");
        let client = AttendanceRestClient::new(config).expect("client creation");
        assert_eq!(client.config().base_url, "https://api.example.com");
        assert_eq!(client.config().api_token, Some("test-token".to_string()));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client =
            AttendanceRestClient::with_base_url("http://localhost:8000/api/v1/").expect("client");
        let url = client.url("/persons").expect("url");
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/persons");
    }

    #[test]
    fn test_client_rejects_unbounded_retries() {
        let config = RestConfig::default().with_max_retries(64);
        let client = AttendanceRestClient::new(config);
        assert!(matches!(client, Err(RestError::InvalidConfig(_))));
    }
}
