//! REST client errors.
//!
//! The backend reports failures in two shapes: its own envelope
//! `{"success": false, "error": {"code", "message"}, "requestId"}` and the
//! `{"detail": ...}` body raised by route guards (401, 403, 404).

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

/// Error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
    #[serde(rename = "requestId", default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Route guard body.
#[derive(Debug, Deserialize)]
struct DetailBody {
    detail: serde_json::Value,
}

/// REST client errors.
#[derive(Debug)]
pub enum RestError {
    /// HTTP request failed before a response arrived.
    Request(reqwest::Error),

    /// Response body did not match the expected shape.
    Deserialization(String),

    /// Backend rejected the request.
    Api {
        /// HTTP status.
        status: u16,
        /// Backend error code, or the numeric status when the body has none.
        code: String,
        /// Error message.
        message: String,
        /// Request ID echoed by the backend, for correlating with its logs.
        request_id: Option<String>,
    },

    /// Rate limited (429).
    RateLimited {
        /// Seconds from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// Resource not found (404).
    NotFound(String),

    /// Missing or rejected token (401).
    Unauthorized(String),

    /// Token lacks the permission the endpoint checks (403).
    Forbidden(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// Request timeout.
    Timeout,
}

impl RestError {
    /// Maps a non-success response to an error.
    pub(crate) fn from_response(
        status: StatusCode,
        path: &str,
        retry_after: Option<u64>,
        body: &str,
    ) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { retry_after },
            StatusCode::NOT_FOUND => Self::NotFound(path.to_string()),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(body_message(status, body)),
            StatusCode::FORBIDDEN => Self::Forbidden(body_message(status, body)),
            _ => match serde_json::from_str::<ErrorEnvelope>(body) {
                Ok(envelope) => Self::Api {
                    status: status.as_u16(),
                    code: envelope.error.code,
                    message: envelope.error.message,
                    request_id: envelope.request_id,
                },
                Err(_) => Self::Api {
                    status: status.as_u16(),
                    code: status.as_str().to_string(),
                    message: body_message(status, body),
                    request_id: None,
                },
            },
        }
    }

    /// Returns true if retrying the same request later may succeed.
    ///
    /// Covers rate limiting, timeouts, refused connections and 5xx
    /// responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout => true,
            Self::Request(e) => e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Extracts the human-readable message from an error body.
fn body_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    if let Ok(detail) = serde_json::from_str::<DetailBody>(body) {
        return match detail.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("no body").to_string()
    } else {
        body.to_string()
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "HTTP request failed: {}", e),
            Self::Deserialization(msg) => write!(f, "invalid response body: {}", msg),
            Self::Api {
                status,
                code,
                message,
                request_id,
            } => {
                write!(f, "API error [{}] (HTTP {}): {}", code, status, message)?;
                if let Some(id) = request_id {
                    write!(f, " (request {})", id)?;
                }
                Ok(())
            }
            Self::RateLimited {
                retry_after: Some(secs),
            } => write!(f, "rate limited, retry after {} seconds", secs),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::NotFound(resource) => write!(f, "not found: {}", resource),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {}", msg),
            Self::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Timeout => write!(f, "request timeout"),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}
