//! Event Series Routes
//!
//! - GET /api/v1/glucose?anchor=..&pre=..&post=.. - Glucose readings in a window
//! - GET /api/v1/insulin?anchor=..&pre=..&post=.. - Insulin deliveries in a window
//! - POST /api/v1/glucose - Store one reading
//! - POST /api/v1/insulin - Store one delivery
//!
//! Windows default to one hour before and six hours after the anchor.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{InsertResponse, WindowQuery, WindowResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::{
    GlucoseReading, InsulinDelivery, SeriesRecord, TimeWindow, DEFAULT_POST_HOURS,
    DEFAULT_PRE_HOURS,
};

fn window<T: SeriesRecord>(state: &AppState, query: &WindowQuery) -> ApiResult<WindowResponse<T>> {
    let pre = query.pre.unwrap_or(DEFAULT_PRE_HOURS);
    let post = query.post.unwrap_or(DEFAULT_POST_HOURS);
    if pre < 0 || post < 0 {
        return Err(ApiError::Validation(
            "pre and post must not be negative".to_string(),
        ));
    }

    let range = TimeWindow::around(query.anchor, pre, post).ok_or_else(|| {
        ApiError::Validation(format!(
            "window -{}h/+{}h around {} is out of range",
            pre, post, query.anchor
        ))
    })?;
    let events = state.store.query_range::<T>(range)?;

    Ok(WindowResponse {
        begin: range.begin,
        end: range.end,
        total: events.len(),
        events,
    })
}

fn insert<T: SeriesRecord>(state: &AppState, record: &T) -> ApiResult<(StatusCode, Json<InsertResponse>)> {
    let id = state.store.insert(record)?;
    let series = T::KIND;
    tracing::debug!(%series, id, "Stored {}", record);
    Ok((StatusCode::CREATED, Json(InsertResponse { id })))
}

/// GET /api/v1/glucose
pub async fn glucose_window(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<WindowResponse<GlucoseReading>>> {
    Ok(Json(window(&state, &query)?))
}

/// GET /api/v1/insulin
pub async fn insulin_window(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<WindowResponse<InsulinDelivery>>> {
    Ok(Json(window(&state, &query)?))
}

/// POST /api/v1/glucose
///
/// 409 when a reading already exists at the timestamp.
pub async fn add_glucose(
    State(state): State<Arc<AppState>>,
    Json(reading): Json<GlucoseReading>,
) -> ApiResult<(StatusCode, Json<InsertResponse>)> {
    insert(&state, &reading)
}

/// POST /api/v1/insulin
///
/// 409 when a delivery already exists at the timestamp.
pub async fn add_insulin(
    State(state): State<Arc<AppState>>,
    Json(delivery): Json<InsulinDelivery>,
) -> ApiResult<(StatusCode, Json<InsertResponse>)> {
    insert(&state, &delivery)
}
