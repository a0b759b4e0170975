//! Live Chart Microservice
//!
//! Keeps a live telemetry chart in sync:
//! - Historical backfill per metric (raw or mean-aggregated)
//! - Catalog-ordered trace insertion
//! - Push subscriptions with real-time gating
//! - Automatic resynchronization after reconnects
//! - HTTP API for range filters, chart snapshots and readouts

mod config;
mod error;
mod handlers;
mod routes;
mod service;

use std::sync::Arc;

use telesync_core::{ServiceRuntime, TelesyncService};
use telesync_sync::{InMemoryChart, InMemoryDisplay, SyncEngine};
use tracing::info;

pub use config::Config;
pub use error::{Error, Result};
use service::LiveChartService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn TelesyncService>,
    pub engine: Arc<SyncEngine>,
    pub chart: Arc<InMemoryChart>,
    pub display: Arc<InMemoryDisplay>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telesync_telemetry::init("live-chart")?;

    info!("Starting live chart microservice");

    let config = Config::from_env()?;
    let service_config = config.service.clone();
    let service = Arc::new(LiveChartService::new(config)?);
    ServiceRuntime::run(service, &service_config).await?;

    Ok(())
}
