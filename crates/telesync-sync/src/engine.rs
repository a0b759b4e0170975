//! Engine wiring
//!
//! [`SyncEngine`] owns the shared context and the components around it, runs
//! the backfill cycle for a window generation, and dispatches push transport
//! events through the reconnection state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use telesync_core::{now_millis, MetricId, Timestamp};
use telesync_history_sdk::HistoricalSource;
use telesync_push_sdk::{PushEvent, PushTransport};

use crate::backfill::{BackfillFetcher, BackfillOutcome};
use crate::catalog::MetricCatalog;
use crate::context::{ChartSnapshot, SyncContext};
use crate::metrics::{SyncMetrics, SyncStats};
use crate::range::{Window, WindowSnapshot};
use crate::realtime::{LiveOutcome, RealtimeSubscriber};
use crate::reconnect::{Reaction, ReconnectionManager, TransportState};
use crate::sink::{ChartSink, Dimensions, DisplaySink, Notice, NoticeKind};
use crate::writer::OrderedSeriesWriter;
use crate::{Result, SyncConfig};

pub struct SyncEngine {
    context: Arc<SyncContext>,
    fetcher: Arc<BackfillFetcher>,
    writer: OrderedSeriesWriter,
    subscriber: RealtimeSubscriber,
    reconnection: ReconnectionManager,
    transport: Arc<dyn PushTransport>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Build the engine and spawn its writer task. Must run inside a tokio runtime.
    pub fn new(
        config: SyncConfig,
        catalog: MetricCatalog,
        source: Arc<dyn HistoricalSource>,
        transport: Arc<dyn PushTransport>,
        chart: Arc<dyn ChartSink>,
        display: Arc<dyn DisplaySink>,
    ) -> Result<Arc<Self>> {
        let metrics = SyncMetrics::new();
        let threshold = config.max_chart_points;
        let context = Arc::new(SyncContext::new(
            Arc::new(catalog),
            config,
            chart,
            display,
            metrics.clone(),
        )?);

        let fetcher = Arc::new(BackfillFetcher::new(source, threshold, metrics));
        let (writer, writer_task) = OrderedSeriesWriter::spawn(context.clone());
        let subscriber = RealtimeSubscriber::new(transport.clone(), context.clone());

        Ok(Arc::new(Self {
            context,
            fetcher,
            writer,
            subscriber,
            reconnection: ReconnectionManager::new(),
            transport,
            tasks: Mutex::new(vec![writer_task]),
        }))
    }

    /// Register every live subscription and backfill the initial window
    pub async fn start(&self) -> Result<WindowSnapshot> {
        let subscribed = self.subscriber.subscribe_all().await?;
        let snapshot = self.context.current_window();
        info!(
            subscribed,
            series = self.context.catalog().series_len(),
            generation = snapshot.generation,
            "Sync engine started"
        );
        self.restart_backfill(snapshot);
        Ok(snapshot)
    }

    /// Consume transport events until the stream ends
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PushEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Push event stream ended");
    }

    pub async fn handle_event(&self, event: PushEvent) {
        if let PushEvent::Value { metric, payload } = &event {
            self.handle_value(metric, payload);
            return;
        }

        for reaction in self.reconnection.on_event(&event) {
            match reaction {
                Reaction::Authenticate => {
                    if let Err(e) = self.transport.authenticate().await {
                        warn!(error = %e, "Failed to send authentication handshake");
                    }
                }
                Reaction::Rearm => {
                    self.subscriber.rearm().await;
                }
                Reaction::ResetLive => {
                    self.context.metrics().reconnects.inc();
                    if let Err(e) = self.reset_live() {
                        warn!(error = %e, "Failed to reset live window");
                    }
                }
                Reaction::GoOffline => self.context.set_realtime(false),
                Reaction::NotifyDisconnected(reason) => self
                    .context
                    .notify(Notice::new(NoticeKind::Disconnected, reason)),
                Reaction::NotifyError(message) => self
                    .context
                    .notify(Notice::new(NoticeKind::TransportError, message)),
            }
        }
    }

    pub fn handle_value(&self, metric: &MetricId, payload: &str) -> LiveOutcome {
        self.subscriber.handle_event(metric, payload)
    }

    /// Operator range filter: leaves real-time mode and rebuilds the chart
    pub fn apply_filter(&self, start: Timestamp, end: Timestamp) -> Result<WindowSnapshot> {
        let window = Window::new(start, end, false)?;
        Ok(self.install(window))
    }

    /// Operator preset: real-time window over the last `minutes`
    pub fn set_live_span(&self, minutes: u64) -> Result<WindowSnapshot> {
        let span_ms = (minutes as i64).saturating_mul(60_000);
        let window = Window::live(now_millis(), span_ms)?;
        Ok(self.install(window))
    }

    /// Default live window, as after a reconnect
    pub fn reset_live(&self) -> Result<WindowSnapshot> {
        let window = Window::live(now_millis(), self.context.config().default_span_millis())?;
        Ok(self.install(window))
    }

    fn install(&self, window: Window) -> WindowSnapshot {
        let snapshot = self.context.replace_window(window);
        info!(
            generation = snapshot.generation,
            start = window.start,
            end = window.end,
            realtime = window.realtime,
            "Window installed, restarting backfill"
        );
        self.restart_backfill(snapshot);
        snapshot
    }

    /// Spawn one backfill task per series for the given generation
    fn restart_backfill(&self, snapshot: WindowSnapshot) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());

        let catalog = self.context.catalog().clone();
        for (index, metric) in catalog.series().enumerate() {
            let context = self.context.clone();
            let fetcher = self.fetcher.clone();
            let writer = self.writer.clone();
            let metric = metric.id.clone();
            let WindowSnapshot { window, generation } = snapshot;

            tasks.push(tokio::spawn(async move {
                if !context.mark_fetching(generation, index) {
                    return;
                }

                let outcome = match fetcher.fetch(&metric, &window).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        if context.is_current(generation) {
                            warn!(metric = %metric, error = %e, "Backfill failed");
                            context.notify(Notice::new(
                                NoticeKind::FetchFailed {
                                    metric: metric.clone(),
                                },
                                e.to_string(),
                            ));
                        }
                        BackfillOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                };

                if !context.is_current(generation) {
                    debug!(metric = %metric, generation, "Discarding backfill of a replaced window");
                    return;
                }
                if !writer.submit(generation, index, outcome) {
                    warn!(metric = %metric, "Ordered writer is gone");
                }
            }));
        }
    }

    pub fn relayout(&self, dimensions: Dimensions) {
        self.context.chart().relayout(dimensions);
    }

    pub fn current_window(&self) -> WindowSnapshot {
        self.context.current_window()
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        self.context.snapshot()
    }

    pub fn stats(&self) -> SyncStats {
        self.context.metrics().snapshot()
    }

    pub fn transport_state(&self) -> TransportState {
        self.reconnection.transport_state()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether the push server accepted the handshake on the current connection
    pub fn is_authenticated(&self) -> bool {
        self.reconnection.is_authenticated()
    }

    /// Traces written for the current window, and how many are expected
    pub fn backfill_progress(&self) -> (usize, usize) {
        (self.context.written(), self.context.catalog().series_len())
    }

    pub fn subscriptions(&self) -> Vec<MetricId> {
        self.subscriber.subscriptions().ids()
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        self.context.catalog()
    }

    /// Close the push channel and stop the writer and any running backfills
    pub fn shutdown(&self) {
        self.transport.close();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Sync engine stopped");
    }
}
