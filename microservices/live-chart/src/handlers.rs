//! HTTP handlers for the live chart API

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use telesync_core::{Liveness, Readiness, Timestamp};
use telesync_sync::{ChartSnapshot, Dimensions, Notice, Readouts, SyncStats, WindowSnapshot};

use crate::{AppState, Error, Result};

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct LiveRequest {
    pub minutes: u64,
}

#[derive(Serialize)]
pub struct ChartResponse {
    #[serde(flatten)]
    pub chart: ChartSnapshot,
    pub dimensions: Option<Dimensions>,
}

#[derive(Serialize)]
pub struct ReadoutsResponse {
    #[serde(flatten)]
    pub readouts: Readouts,
    pub notices: Vec<Notice>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub sync: SyncStats,
}

// ============================================
// Health & Metrics
// ============================================

pub async fn health(State(state): State<AppState>) -> Json<Liveness> {
    Json(state.service.liveness())
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.service.readiness();
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_secs: state.service.liveness().uptime_secs,
        sync: state.engine.stats(),
    })
}

// ============================================
// Window
// ============================================

pub async fn get_window(State(state): State<AppState>) -> Json<WindowSnapshot> {
    Json(state.engine.current_window())
}

pub async fn apply_filter(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<WindowSnapshot>> {
    let snapshot = state.engine.apply_filter(req.start, req.end)?;
    Ok(Json(snapshot))
}

pub async fn set_live(
    State(state): State<AppState>,
    Json(req): Json<LiveRequest>,
) -> Result<Json<WindowSnapshot>> {
    if req.minutes == 0 {
        return Err(Error::InvalidRequest("minutes must be positive".to_string()));
    }
    let snapshot = state.engine.set_live_span(req.minutes)?;
    Ok(Json(snapshot))
}

// ============================================
// Chart & Display
// ============================================

pub async fn get_chart(State(state): State<AppState>) -> Json<ChartResponse> {
    Json(ChartResponse {
        chart: state.engine.snapshot(),
        dimensions: state.chart.dimensions(),
    })
}

pub async fn relayout(
    State(state): State<AppState>,
    Json(dimensions): Json<Dimensions>,
) -> Result<StatusCode> {
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(Error::InvalidRequest("width and height must be positive".to_string()));
    }
    state.engine.relayout(dimensions);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_readouts(State(state): State<AppState>) -> Json<ReadoutsResponse> {
    Json(ReadoutsResponse {
        readouts: state.display.readouts(),
        notices: state.display.notices(),
    })
}
