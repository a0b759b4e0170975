//! Router configuration for the live chart API

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Metrics
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/stats", get(handlers::stats))
        // Window
        .route("/api/v1/window", get(handlers::get_window))
        .route("/api/v1/window/filter", post(handlers::apply_filter))
        .route("/api/v1/window/live", post(handlers::set_live))
        // Chart & Display
        .route("/api/v1/chart", get(handlers::get_chart))
        .route("/api/v1/chart/layout", post(handlers::relayout))
        .route("/api/v1/readouts", get(handlers::get_readouts))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::service::LiveChartService;
    use serde_json::{json, Value};
    use telesync_core::{MetricId, SeriesPoint, Timestamp};
    use tokio::sync::mpsc;
    use telesync_history_sdk::{AggregateRequest, HistoricalSource};
    use telesync_push_sdk::{PushError, PushEvent, PushTransport};
    use telesync_sync::{
        InMemoryChart, InMemoryDisplay, Metric, MetricCatalog, SyncConfig, SyncEngine,
    };

    struct FlatSource;

    #[async_trait]
    impl HistoricalSource for FlatSource {
        async fn count(&self, _: &MetricId, _: Timestamp, _: Timestamp) -> telesync_history_sdk::Result<u64> {
            Ok(2)
        }

        async fn raw_points(
            &self,
            _: &MetricId,
            _: Timestamp,
            end: Timestamp,
            _: u64,
        ) -> telesync_history_sdk::Result<Vec<SeriesPoint>> {
            Ok(vec![SeriesPoint::new(end, 2.0), SeriesPoint::new(end - 1_000, 1.0)])
        }

        async fn aggregate(
            &self,
            _: &AggregateRequest,
        ) -> telesync_history_sdk::Result<Vec<Vec<SeriesPoint>>> {
            Ok(vec![Vec::new()])
        }
    }

    #[derive(Default)]
    struct OfflineTransport {
        connected: AtomicBool,
    }

    #[async_trait]
    impl PushTransport for OfflineTransport {
        async fn authenticate(&self) -> telesync_push_sdk::Result<()> {
            Err(PushError::NotConnected)
        }

        async fn subscribe(&self, _: &MetricId) -> telesync_push_sdk::Result<()> {
            Err(PushError::NotConnected)
        }

        async fn unsubscribe(&self, _: &MetricId) -> telesync_push_sdk::Result<()> {
            Err(PushError::NotConnected)
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    async fn serve() -> (String, AppState) {
        serve_with(Arc::new(OfflineTransport::default())).await
    }

    async fn serve_with(transport: Arc<OfflineTransport>) -> (String, AppState) {
        let catalog = MetricCatalog::new(vec![
            Metric::series("flow", "Flow"),
            Metric::total("total", "Total"),
        ])
        .unwrap();
        let chart = Arc::new(InMemoryChart::new());
        let display = Arc::new(InMemoryDisplay::new());
        let engine = SyncEngine::new(
            SyncConfig::default(),
            catalog,
            Arc::new(FlatSource),
            transport,
            chart.clone(),
            display.clone(),
        )
        .unwrap();
        engine.start().await.unwrap();

        let (_events_tx, events) = mpsc::channel(1);
        let service = Arc::new(LiveChartService::from_parts(
            "127.0.0.1:0".to_string(),
            engine,
            chart,
            display,
            events,
        ));
        let state = service.app_state();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    async fn wait_for_chart(state: &AppState) {
        for _ in 0..200 {
            if state.engine.snapshot().written == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("chart never populated");
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (base, state) = serve().await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["service"], "live-chart");
        assert!(health["uptime_secs"].is_u64());

        let ready = client.get(format!("{}/ready", base)).send().await.unwrap();
        assert_eq!(ready.status(), 503);
        let body: Value = ready.json().await.unwrap();
        assert_eq!(body["ready"], false);
        assert_eq!(body["checks"][0]["name"], "push_channel");
        assert_eq!(body["checks"][0]["ok"], false);
        assert_eq!(body["checks"][0]["detail"], "disconnected");
        assert_eq!(body["checks"][1]["name"], "backfill");
        assert_eq!(state.engine.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn test_ready_once_authenticated_and_backfilled() {
        let transport = Arc::new(OfflineTransport::default());
        transport.connected.store(true, Ordering::SeqCst);
        let (base, state) = serve_with(transport).await;
        wait_for_chart(&state).await;

        let url = format!("{}/ready", base);
        let before = reqwest::get(&url).await.unwrap();
        assert_eq!(before.status(), 503);

        state.engine.handle_event(PushEvent::Connected).await;
        state.engine.handle_event(PushEvent::Authenticated).await;

        let after = reqwest::get(&url).await.unwrap();
        assert_eq!(after.status(), 200);
        let body: Value = after.json().await.unwrap();
        assert_eq!(body["ready"], true);
        assert_eq!(body["checks"][0]["detail"], "connected");
        assert_eq!(body["checks"][1]["detail"], "1/1 traces");
    }

    #[tokio::test]
    async fn test_filter_rejects_inverted_range() {
        let (base, _) = serve().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/v1/window/filter", base))
            .json(&json!({"start": 2000, "end": 1000}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_RANGE");
    }

    #[tokio::test]
    async fn test_filter_then_live_preset() {
        let (base, state) = serve().await;
        let client = reqwest::Client::new();

        let window: Value = client
            .post(format!("{}/api/v1/window/filter", base))
            .json(&json!({"start": 1000, "end": 61000}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(window["realtime"], false);
        assert_eq!(window["generation"], 1);

        let live: Value = client
            .post(format!("{}/api/v1/window/live", base))
            .json(&json!({"minutes": 15}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(live["realtime"], true);
        assert_eq!(live["generation"], 2);

        let current: Value = client
            .get(format!("{}/api/v1/window", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current, live);

        let zero = client
            .post(format!("{}/api/v1/window/live", base))
            .json(&json!({"minutes": 0}))
            .send()
            .await
            .unwrap();
        assert_eq!(zero.status(), 400);
        assert_eq!(state.engine.current_window().generation, 2);
    }

    #[tokio::test]
    async fn test_chart_layout_and_readouts() {
        let (base, state) = serve().await;
        let client = reqwest::Client::new();
        wait_for_chart(&state).await;

        let layout = client
            .post(format!("{}/api/v1/chart/layout", base))
            .json(&json!({"width": 1024, "height": 480}))
            .send()
            .await
            .unwrap();
        assert_eq!(layout.status(), 204);

        let chart: Value = client
            .get(format!("{}/api/v1/chart", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(chart["written"], 1);
        assert_eq!(chart["traces"][0]["name"], "Flow");
        assert_eq!(chart["traces"][0]["state"], "inserted");
        assert_eq!(chart["traces"][0]["points"].as_array().unwrap().len(), 2);
        assert_eq!(chart["dimensions"]["width"], 1024);

        state
            .engine
            .handle_value(&MetricId::new("total"), r#"{"value": 42.0, "timestamp": 1}"#);
        let readouts: Value = client
            .get(format!("{}/api/v1/readouts", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(readouts["numeric"]["total"], 42.0);

        let stats: Value = client
            .get(format!("{}/stats", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["backfill_raw"], 1);
    }
}
