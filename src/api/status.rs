use super::health::{check_health, HealthStatus};
use crate::config::MonitorConfig;
use crate::metrics::PipelineMetrics;
use crate::quality::QualityMonitor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the status API
pub struct StatusAppState {
    pub metrics: Arc<PipelineMetrics>,
    pub monitor: QualityMonitor,
    pub monitor_config: MonitorConfig,
    /// Time window for "active source" tracking (seconds)
    pub active_source_window_seconds: i64,
}

/// Query parameters for the quality report
#[derive(Deserialize)]
pub struct QualityParams {
    /// Trailing window in minutes (defaults to the configured report window)
    pub window_minutes: Option<i64>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create status API router
pub fn create_status_router(state: StatusAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/metrics", get(metrics))
        .route("/api/quality", get(quality))
        .with_state(Arc::new(state))
}

/// GET /health - 200 when healthy or degraded, 503 when unhealthy
async fn health(State(state): State<Arc<StatusAppState>>) -> Response {
    let report = check_health(&state.metrics, &state.monitor, &state.monitor_config, Utc::now());
    let code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(report)).into_response()
}

/// GET /api/metrics - counter snapshot, event rate, active sources
async fn metrics(State(state): State<Arc<StatusAppState>>) -> Response {
    Json(state.metrics.snapshot(state.active_source_window_seconds)).into_response()
}

/// GET /api/quality - data quality over a trailing window
///
/// Query parameters:
/// - `window_minutes`: trailing window, must be positive (e.g., ?window_minutes=15)
async fn quality(
    State(state): State<Arc<StatusAppState>>,
    Query(params): Query<QualityParams>,
) -> Response {
    let window_minutes = params
        .window_minutes
        .unwrap_or(state.monitor_config.report_window_minutes);

    if window_minutes <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "window_minutes must be positive".to_string(),
            }),
        )
            .into_response();
    }

    match state.monitor.get_quality_metrics(window_minutes) {
        Some(report) => Json(report).into_response(),
        None => Json(json!({
            "status": "no_data",
            "window_minutes": window_minutes,
        }))
        .into_response(),
    }
}
