//! Health Routes
//!
//! Health check endpoints for monitoring.
//!
//! - GET /health/live - Liveness check (process is alive)
//! - GET /health/ready - Readiness check (broker session established)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Browsers can connect while the broker is down, but nothing will be
/// relayed, so the service only reports ready with a broker session.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.relay.broker_connected() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let broker_ok = state.relay.broker_connected();

    Json(HealthResponse {
        status: if broker_ok { "healthy" } else { "degraded" }.to_string(),
        broker: if broker_ok { "connected" } else { "disconnected" }.to_string(),
        connections: state.hub().connection_count(),
        topics: state.cache().len().await,
        tiles: state.tiles.len().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
