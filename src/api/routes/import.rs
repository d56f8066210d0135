//! Import Route
//!
//! - POST /api/v1/import - Commit a t:connect therapy event feed
//!
//! Body is the fetched document with the feed under `ciqEvents`.

use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::ImportResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::import::{self, TracingReporter};

/// POST /api/v1/import
pub async fn import_feed(
    State(state): State<Arc<AppState>>,
    Json(feed): Json<Value>,
) -> ApiResult<Json<ImportResponse>> {
    let store = Arc::clone(&state.store);

    // One transaction per record; keep it off the async workers
    let report = tokio::task::spawn_blocking(move || {
        import::commit(&store, &feed, &TracingReporter)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Import task failed: {}", e)))??;

    Ok(Json(ImportResponse::from(report)))
}
