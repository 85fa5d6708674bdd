//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (consumer is running)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;
use crate::relay::RelayStatus;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the consumer is attached and relaying.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.relay_status().await.is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let relay = state.relay_status().await;

    let status = match relay {
        RelayStatus::Running { .. } => "healthy",
        RelayStatus::Starting => "degraded",
        RelayStatus::Failed { .. } | RelayStatus::Stopped => "unhealthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        relay,
        connections: state.ws_connection_count().await,
        devices: state.tracker.device_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
