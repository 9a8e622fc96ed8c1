use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    /// `None` when persistence is disabled.
    pub database: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub uptime_secs: u64,
    pub checks: ReadinessChecks,
}

/// `GET /`
pub async fn liveness() -> impl IntoResponse {
    Json(LivenessResponse {
        status: "ok",
        message: "Server is running",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /api/health/ready`
pub async fn readiness(State(state): State<Arc<AppState>>) -> Response {
    let database = match &state.store {
        Some(store) => Some(store.ping().await.is_ok()),
        None => None,
    };

    let ready = database.unwrap_or(true);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            uptime_secs: state.start_time.elapsed().as_secs(),
            checks: ReadinessChecks { database },
        }),
    )
        .into_response()
}
