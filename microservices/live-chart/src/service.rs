//! Live chart service lifecycle

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use telesync_core::{CoreError, Readiness, ReadinessCheck, TelesyncService};
use telesync_history_sdk::RestHistoricalSource;
use telesync_push_sdk::{PushEvent, WsPushTransport};
use telesync_sync::{InMemoryChart, InMemoryDisplay, MetricCatalog, SyncEngine};

use crate::{routes, AppState, Config, Error, Result};

pub struct LiveChartService {
    http_bind: String,
    engine: Arc<SyncEngine>,
    chart: Arc<InMemoryChart>,
    display: Arc<InMemoryDisplay>,
    events: Mutex<Option<mpsc::Receiver<PushEvent>>>,
    started: Instant,
}

impl LiveChartService {
    /// Wire the REST history source and WebSocket push channel from `config`
    pub fn new(config: Config) -> Result<Self> {
        let catalog = MetricCatalog::load(&config.catalog_path)?;
        info!(
            catalog = %config.catalog_path.display(),
            metrics = catalog.len(),
            series = catalog.series_len(),
            "Catalog loaded"
        );

        let source = Arc::new(RestHistoricalSource::new(&config.history)?);
        let (transport, events) = WsPushTransport::connect(config.push.clone());

        let chart = Arc::new(InMemoryChart::new());
        let display = Arc::new(InMemoryDisplay::new());

        let engine = SyncEngine::new(
            config.sync.clone(),
            catalog,
            source,
            Arc::new(transport),
            chart.clone(),
            display.clone(),
        )?;

        Ok(Self::from_parts(
            config.service.http_bind,
            engine,
            chart,
            display,
            events,
        ))
    }

    /// Assemble the service around an already built engine
    pub fn from_parts(
        http_bind: String,
        engine: Arc<SyncEngine>,
        chart: Arc<InMemoryChart>,
        display: Arc<InMemoryDisplay>,
        events: mpsc::Receiver<PushEvent>,
    ) -> Self {
        Self {
            http_bind,
            engine,
            chart,
            display,
            events: Mutex::new(Some(events)),
            started: Instant::now(),
        }
    }

    pub fn app_state(self: &Arc<Self>) -> AppState {
        AppState {
            service: self.clone(),
            engine: self.engine.clone(),
            chart: self.chart.clone(),
            display: self.display.clone(),
        }
    }
}

#[async_trait]
impl TelesyncService for LiveChartService {
    fn service_id(&self) -> &'static str {
        "live-chart"
    }

    fn started_at(&self) -> Instant {
        self.started
    }

    fn readiness(&self) -> Readiness {
        let linked = self.engine.is_connected() && self.engine.is_authenticated();
        let (written, expected) = self.engine.backfill_progress();

        Readiness::from_checks(vec![
            ReadinessCheck::new("push_channel", linked)
                .with_detail(self.engine.transport_state().as_str()),
            ReadinessCheck::new("backfill", written >= expected)
                .with_detail(format!("{}/{} traces", written, expected)),
        ])
    }

    async fn shutdown(&self) -> telesync_core::Result<()> {
        info!("Shutting down live chart");
        self.engine.shutdown();
        Ok(())
    }

    async fn start(self: Arc<Self>) -> telesync_core::Result<()> {
        let events = self
            .events
            .lock()
            .take()
            .ok_or_else(|| CoreError::Service("live chart already started".to_string()))?;

        self.engine.start().await.map_err(Error::from)?;
        tokio::spawn(self.engine.clone().run(events));

        let app = routes::create_router(self.app_state());

        let listener = tokio::net::TcpListener::bind(&self.http_bind).await?;
        info!(http_addr = %self.http_bind, "Live chart listening");
        axum::serve(listener, app).await?;

        Ok(())
    }
}
