//! Live point subscriptions
//!
//! One logical subscription per catalog metric. Incoming payloads are decoded
//! and routed by metric kind: series points go to the chart behind the gate,
//! totals and indicators only update the display.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use telesync_core::{MetricId, SeriesPoint, Timestamp};
use telesync_push_sdk::{PushError, PushTransport};

use crate::catalog::{Metric, MetricKind};
use crate::context::{LiveApply, SyncContext};
use crate::{Result, SyncError};

/// Where events for a subscribed id are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Series { index: usize },
    Total,
    Indicator,
}

/// Registered live handlers, keyed by metric id
#[derive(Default)]
pub struct SubscriptionSet {
    handlers: DashMap<MetricId, Route>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id already had a handler
    pub fn register(&self, metric: MetricId, route: Route) -> bool {
        self.handlers.insert(metric, route).is_none()
    }

    pub fn remove(&self, metric: &MetricId) -> Option<Route> {
        self.handlers.remove(metric).map(|(_, route)| route)
    }

    pub fn route(&self, metric: &MetricId) -> Option<Route> {
        self.handlers.get(metric).map(|r| *r)
    }

    pub fn contains(&self, metric: &MetricId) -> bool {
        self.handlers.contains_key(metric)
    }

    pub fn ids(&self) -> Vec<MetricId> {
        let mut ids: Vec<_> = self.handlers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct LivePayload {
    value: f64,
    timestamp: Timestamp,
}

/// Decode a JSON-encoded `{value, timestamp}` payload
pub fn decode_payload(metric: &MetricId, payload: &str) -> Result<SeriesPoint> {
    let decoded: LivePayload =
        serde_json::from_str(payload).map_err(|e| SyncError::DecodeFailure {
            metric: metric.clone(),
            reason: e.to_string(),
        })?;
    if !decoded.value.is_finite() {
        return Err(SyncError::DecodeFailure {
            metric: metric.clone(),
            reason: "value is not finite".to_string(),
        });
    }
    Ok(SeriesPoint::new(decoded.timestamp, decoded.value))
}

/// What happened to one live event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Applied,
    GateMiss,
    Stale,
    /// Display-only update (total or indicator)
    Displayed,
    DecodeFailed,
    /// No handler registered for the id
    Unrouted,
}

pub struct RealtimeSubscriber {
    transport: Arc<dyn PushTransport>,
    context: Arc<SyncContext>,
    subscriptions: SubscriptionSet,
}

impl RealtimeSubscriber {
    pub fn new(transport: Arc<dyn PushTransport>, context: Arc<SyncContext>) -> Self {
        Self {
            transport,
            context,
            subscriptions: SubscriptionSet::new(),
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    fn route_for(&self, metric: &Metric) -> Option<Route> {
        match metric.kind {
            MetricKind::Series => self
                .context
                .catalog()
                .series_index(&metric.id)
                .map(|index| Route::Series { index }),
            MetricKind::Total => Some(Route::Total),
            MetricKind::Indicator => Some(Route::Indicator),
        }
    }

    /// Publish the subscribe intent for `metric` and register its handler.
    ///
    /// While the transport is down the handler is still registered; the
    /// intent goes out when subscriptions are re-armed after authentication.
    pub async fn subscribe(&self, metric: &Metric) -> Result<()> {
        let Some(route) = self.route_for(metric) else {
            return Err(SyncError::InvalidCatalog(format!(
                "{} is not a series of this catalog",
                metric.id
            )));
        };

        match self.transport.subscribe(&metric.id).await {
            Ok(()) => {}
            Err(PushError::NotConnected) => {
                debug!(metric = %metric.id, "Transport down, subscription deferred");
            }
            Err(e) => return Err(e.into()),
        }

        if self.subscriptions.register(metric.id.clone(), route) {
            self.context
                .metrics()
                .subscriptions
                .set(self.subscriptions.len() as u64);
        }
        Ok(())
    }

    /// Subscribe every catalog metric; returns how many are registered
    pub async fn subscribe_all(&self) -> Result<usize> {
        let catalog = self.context.catalog().clone();
        for metric in catalog.metrics() {
            self.subscribe(metric).await?;
        }
        Ok(self.subscriptions.len())
    }

    pub async fn unsubscribe(&self, metric: &MetricId) -> Result<()> {
        match self.transport.unsubscribe(metric).await {
            Ok(()) | Err(PushError::NotConnected) => {}
            Err(e) => return Err(e.into()),
        }
        if self.subscriptions.remove(metric).is_some() {
            self.context
                .metrics()
                .subscriptions
                .set(self.subscriptions.len() as u64);
        }
        Ok(())
    }

    /// Re-publish the subscribe intent of every registered id
    pub async fn rearm(&self) -> usize {
        let mut armed = 0;
        for metric in self.subscriptions.ids() {
            match self.transport.subscribe(&metric).await {
                Ok(()) => armed += 1,
                Err(e) => warn!(metric = %metric, error = %e, "Failed to re-arm subscription"),
            }
        }
        debug!(armed, total = self.subscriptions.len(), "Subscriptions re-armed");
        armed
    }

    /// Handle one pushed value. Never fails; problems are counted and logged.
    pub fn handle_event(&self, metric: &MetricId, payload: &str) -> LiveOutcome {
        let Some(route) = self.subscriptions.route(metric) else {
            trace!(metric = %metric, "No handler for pushed value");
            return LiveOutcome::Unrouted;
        };

        let metrics = self.context.metrics();
        let point = match decode_payload(metric, payload) {
            Ok(point) => point,
            Err(e) => {
                metrics.live_decode_failure.inc();
                warn!(metric = %metric, error = %e, "Dropping undecodable live value");
                return LiveOutcome::DecodeFailed;
            }
        };

        let display = self.context.display();
        match route {
            Route::Total => {
                display.set_numeric_readout(metric, point.value);
                LiveOutcome::Displayed
            }
            Route::Indicator => {
                display.set_boolean_state(metric, point.value != 0.0);
                LiveOutcome::Displayed
            }
            Route::Series { index } => {
                display.set_numeric_readout(metric, point.value);
                match self.context.apply_live(index, point) {
                    LiveApply::Applied => {
                        metrics.live_applied.inc();
                        LiveOutcome::Applied
                    }
                    LiveApply::GateMiss => {
                        metrics.live_gate_miss.inc();
                        trace!(metric = %metric, "Live value gated");
                        LiveOutcome::GateMiss
                    }
                    LiveApply::Stale => {
                        metrics.live_stale.inc();
                        debug!(metric = %metric, timestamp = point.timestamp, "Dropping stale live value");
                        LiveOutcome::Stale
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::catalog::MetricCatalog;
    use crate::metrics::SyncMetrics;
    use crate::sink::{InMemoryChart, InMemoryDisplay};
    use crate::{BackfillOutcome, SyncConfig};

    #[derive(Default)]
    struct RecordingTransport {
        connected: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn authenticate(&self) -> telesync_push_sdk::Result<()> {
            Ok(())
        }

        async fn subscribe(&self, metric: &MetricId) -> telesync_push_sdk::Result<()> {
            if !self.is_connected() {
                return Err(PushError::NotConnected);
            }
            self.sent.lock().push(format!("sub:{}", metric));
            Ok(())
        }

        async fn unsubscribe(&self, metric: &MetricId) -> telesync_push_sdk::Result<()> {
            self.sent.lock().push(format!("unsub:{}", metric));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        subscriber: RealtimeSubscriber,
        transport: Arc<RecordingTransport>,
        context: Arc<SyncContext>,
        display: Arc<InMemoryDisplay>,
    }

    fn fixture(connected: bool) -> Fixture {
        let catalog = MetricCatalog::new(vec![
            Metric::series("s1", "Flow"),
            Metric::total("t1", "Total"),
            Metric::indicator("i1", "Tank high"),
        ])
        .unwrap();
        let display = Arc::new(InMemoryDisplay::new());
        let context = Arc::new(
            SyncContext::new(
                Arc::new(catalog),
                SyncConfig::default(),
                Arc::new(InMemoryChart::new()),
                display.clone(),
                SyncMetrics::new(),
            )
            .unwrap(),
        );
        let transport = Arc::new(RecordingTransport::default());
        transport.connected.store(connected, Ordering::SeqCst);
        Fixture {
            subscriber: RealtimeSubscriber::new(transport.clone(), context.clone()),
            transport,
            context,
            display,
        }
    }

    const VALUE: &str = r#"{"value": 4.5, "timestamp": 9999999999999}"#;

    #[test]
    fn test_decode_payload() {
        let id = MetricId::new("x");
        assert_eq!(
            decode_payload(&id, r#"{"value": 1.5, "timestamp": 10, "context": {}}"#).unwrap(),
            SeriesPoint::new(10, 1.5)
        );
        assert!(matches!(
            decode_payload(&id, r#"{"value": "high"}"#),
            Err(SyncError::DecodeFailure { .. })
        ));
        assert!(decode_payload(&id, "garbage").is_err());
    }

    #[tokio::test]
    async fn test_subscribe_all_registers_every_kind() {
        let f = fixture(true);
        assert_eq!(f.subscriber.subscribe_all().await.unwrap(), 3);
        assert_eq!(f.transport.sent.lock().len(), 3);
        assert_eq!(
            f.subscriber.subscriptions().route(&MetricId::new("s1")),
            Some(Route::Series { index: 0 })
        );
        assert_eq!(f.context.metrics().subscriptions.get(), 3);
    }

    #[tokio::test]
    async fn test_subscribe_while_down_is_deferred_then_rearmed() {
        let f = fixture(false);
        f.subscriber.subscribe_all().await.unwrap();
        assert!(f.transport.sent.lock().is_empty());
        assert_eq!(f.subscriber.subscriptions().len(), 3);

        f.transport.connected.store(true, Ordering::SeqCst);
        assert_eq!(f.subscriber.rearm().await, 3);
        assert_eq!(f.transport.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_handler() {
        let f = fixture(true);
        f.subscriber.subscribe_all().await.unwrap();
        let id = MetricId::new("t1");
        f.subscriber.unsubscribe(&id).await.unwrap();

        assert!(!f.subscriber.subscriptions().contains(&id));
        assert_eq!(f.subscriber.handle_event(&id, VALUE), LiveOutcome::Unrouted);
        assert!(f.transport.sent.lock().contains(&"unsub:t1".to_string()));
    }

    #[tokio::test]
    async fn test_series_gated_until_inserted() {
        let f = fixture(true);
        f.subscriber.subscribe_all().await.unwrap();
        let id = MetricId::new("s1");

        assert_eq!(f.subscriber.handle_event(&id, VALUE), LiveOutcome::GateMiss);
        // the readout updates regardless of the gate
        assert_eq!(f.display.readout(&id), Some(4.5));

        let gen = f.context.generation();
        f.context.insert_trace(gen, 0, BackfillOutcome::empty(100));
        assert_eq!(f.subscriber.handle_event(&id, VALUE), LiveOutcome::Applied);
        assert_eq!(f.context.metrics().live_applied.get(), 1);
        assert_eq!(f.context.metrics().live_gate_miss.get(), 1);
    }

    #[tokio::test]
    async fn test_totals_and_indicators_only_touch_display() {
        let f = fixture(true);
        f.subscriber.subscribe_all().await.unwrap();

        let total = MetricId::new("t1");
        assert_eq!(f.subscriber.handle_event(&total, VALUE), LiveOutcome::Displayed);
        assert_eq!(f.display.readout(&total), Some(4.5));

        let indicator = MetricId::new("i1");
        f.subscriber
            .handle_event(&indicator, r#"{"value": 0, "timestamp": 1}"#);
        assert_eq!(f.display.state(&indicator), Some(false));
        f.subscriber
            .handle_event(&indicator, r#"{"value": 1, "timestamp": 2}"#);
        assert_eq!(f.display.state(&indicator), Some(true));
        assert_eq!(f.context.written(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_subscription() {
        let f = fixture(true);
        f.subscriber.subscribe_all().await.unwrap();
        let id = MetricId::new("s1");
        assert_eq!(f.subscriber.handle_event(&id, "{nope"), LiveOutcome::DecodeFailed);
        assert!(f.subscriber.subscriptions().contains(&id));
        assert_eq!(f.context.metrics().live_decode_failure.get(), 1);
    }
}
