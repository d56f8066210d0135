//! Health Routes
//!
//! - GET /health/live - Process is up
//! - GET /health/ready - Database answers queries
//! - GET /health - Status with record counts

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 when the database answers a query.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.store.stats() {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /health
///
/// Full health status with record counts.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.store.stats().ok();
    let (status, storage) = if stats.is_some() {
        ("healthy", "ok")
    } else {
        ("unhealthy", "error")
    };

    Json(HealthResponse {
        status: status.to_string(),
        storage: storage.to_string(),
        stats,
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
