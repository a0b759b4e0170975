//! REST historical source integration tests
//!
//! Runs the client against an in-process axum server that mimics the
//! platform's count / values / resample endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use telesync_core::{MetricId, SeriesPoint};
use telesync_history_sdk::{
    AggregatePeriod, AggregateRequest, HistoricalSource, HistoryConfig, HistoryError,
    RestHistoricalSource,
};

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == TOKEN)
        .unwrap_or(false)
}

async fn count(
    headers: HeaderMap,
    Path((id, start, end)): Path<(String, i64, i64)>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad token"})));
    }
    if id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"})));
    }
    let span = (end - start) / 1000;
    (StatusCode::OK, Json(json!({ "count": span })))
}

async fn values(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    if id == "garbled" {
        return (StatusCode::OK, Json(json!({ "results": "not-a-list" })));
    }
    let page_size: i64 = params
        .get("page_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let end: i64 = params.get("end").and_then(|v| v.parse().ok()).unwrap_or(0);
    // newest first
    let results: Vec<Value> = (0..page_size)
        .map(|i| json!({ "timestamp": end - i * 1000, "value": i as f64, "context": {} }))
        .collect();
    (StatusCode::OK, Json(json!({ "count": page_size, "results": results })))
}

async fn resample(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    assert_eq!(body["aggregation"], "mean");
    assert_eq!(body["join_dataframes"], false);
    let period = body["period"].as_str().unwrap_or_default().to_string();
    let series: Vec<Value> = body["variables"]
        .as_array()
        .map(|vars| {
            vars.iter()
                .map(|_| json!([[3000, 3.0], [2000, null], [1000, period.len() as f64]]))
                .collect()
        })
        .unwrap_or_default();
    (StatusCode::OK, Json(json!({ "results": series })))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/v1.6/variables/{id}/statistics/count/{start}/{end}", get(count))
        .route("/api/v1.6/variables/{id}/values", get(values))
        .route("/api/v1.6/data/stats/resample/", post(resample));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, token: &str) -> RestHistoricalSource {
    let config = HistoryConfig::new(format!("http://{}/api/v1.6/", addr), token)
        .with_timeout(Duration::from_secs(5));
    RestHistoricalSource::new(&config).unwrap()
}

#[tokio::test]
async fn test_count_sends_token_and_parses() {
    let addr = spawn_server().await;
    let source = client(addr, TOKEN);

    let count = source
        .count(&MetricId::new("flow"), 1_000, 51_000)
        .await
        .unwrap();
    assert_eq!(count, 50);
}

#[tokio::test]
async fn test_bad_token_is_status_error() {
    let addr = spawn_server().await;
    let source = client(addr, "wrong");

    let err = source
        .count(&MetricId::new("flow"), 0, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_server_error_surfaces_body() {
    let addr = spawn_server().await;
    let source = client(addr, TOKEN);

    match source.count(&MetricId::new("broken"), 0, 1_000).await {
        Err(HistoryError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_raw_points_are_returned_newest_first() {
    let addr = spawn_server().await;
    let source = client(addr, TOKEN);

    let points = source
        .raw_points(&MetricId::new("oxygen"), 0, 10_000, 3)
        .await
        .unwrap();
    assert_eq!(
        points,
        vec![
            SeriesPoint::new(10_000, 0.0),
            SeriesPoint::new(9_000, 1.0),
            SeriesPoint::new(8_000, 2.0),
        ]
    );
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let addr = spawn_server().await;
    let source = client(addr, TOKEN);

    let err = source
        .raw_points(&MetricId::new("garbled"), 0, 10_000, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::Parse(_)));
}

#[tokio::test]
async fn test_aggregate_posts_resample_request() {
    let addr = spawn_server().await;
    let source = client(addr, TOKEN);

    let request = AggregateRequest::mean_of(
        MetricId::new("ph"),
        AggregatePeriod::minutes(5),
        0,
        10_000,
    );
    let series = source.aggregate(&request).await.unwrap();
    assert_eq!(series.len(), 1);
    // "5T" has length 2; the null bucket is dropped
    assert_eq!(
        series[0],
        vec![SeriesPoint::new(3000, 3.0), SeriesPoint::new(1000, 2.0)]
    );
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = client(addr, TOKEN);
    let err = source
        .count(&MetricId::new("flow"), 0, 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::Network(_) | HistoryError::Timeout(_)));
}
