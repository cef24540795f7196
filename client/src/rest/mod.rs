//! HTTP client for the attendance REST API.
//!
//! Only the endpoints the live feed reconciles against are covered: the
//! daily summary, the per-person status, and the persons listing used to
//! enumerate snapshot targets.
//!
//! # Example
//!
//! ```rust,ignore
//! use attendance_client::rest::{AttendanceRestClient, RestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AttendanceRestClient::new(
//!         RestConfig::new("http://localhost:8000/api/v1").with_api_token("..."),
//!     )?;
//!
//!     let summary = client.get_daily_summary(None).await?;
//!     println!("{} of {} present", summary.present, summary.total_persons);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::RestConfig;
pub use error::RestError;
pub use http::AttendanceRestClient;
