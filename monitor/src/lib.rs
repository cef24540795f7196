//! Attendance Monitor - headless host for the live attendance feed.
//!
//! This crate runs the attendance client against a backend: it keeps the
//! live feed connected, reconciles the status map with periodic REST
//! snapshots, logs every applied change and keeps the daily summary fresh.
//!
//! # Components
//!
//! - [`config`]: Monitor configuration from environment variables
//! - [`service`]: Main monitor service
//! - [`notifier`]: Log notifier and refresh channel
//! - [`metrics`]: Monitor metrics

pub mod config;
pub mod metrics;
pub mod notifier;
pub mod service;

pub use config::{ConfigError, MonitorConfig};
pub use metrics::{MonitorMetrics, MonitorMetricsSnapshot};
pub use notifier::{ChannelRefresh, LogNotifier};
pub use service::{MonitorService, SummarySource};
