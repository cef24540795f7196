//! Attendance monitor binary.
//!
//! Hosts the live attendance feed and logs check-ins, check-outs and the
//! daily summary. Configured through `ATTENDANCE_*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use attendance_monitor::{MonitorConfig, MonitorService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,attendance_monitor=debug,attendance_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env().context("invalid monitor configuration")?;

    tracing::info!("Starting attendance monitor");
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("WebSocket URL: {}", config.ws_url);
    if let Some(person_id) = &config.person_id {
        tracing::info!("Following person: {}", person_id);
    }

    let service = Arc::new(MonitorService::new(config)?);
    let runner = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run().await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down attendance monitor");

    service.stop();
    runner.await.context("monitor task failed")?;

    Ok(())
}
