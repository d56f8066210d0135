//! Meal Chart Routes
//!
//! - GET /api/v1/meals/:id/chart - Plotly figure JSON
//! - GET /api/v1/meals/:id/chart.html - Embeddable `<div>` fragment

use axum::{
    extract::{Path, State},
    response::Html,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::chart::{chart_for_meal, Figure};

fn meal_figure(state: &AppState, id: i64) -> ApiResult<Figure> {
    let meal = state
        .store
        .get_meal(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Meal with id {} not found", id)))?;

    chart_for_meal(&state.store, &meal, &state.chart_style)?
        .ok_or_else(|| ApiError::NotFound(format!("No glucose data around meal {}", id)))
}

/// Chart assembly reads a full window of both series; run it off the async workers
async fn load_figure(state: Arc<AppState>, id: i64) -> ApiResult<Figure> {
    tokio::task::spawn_blocking(move || meal_figure(&state, id))
        .await
        .map_err(|e| ApiError::Internal(format!("Chart task failed: {}", e)))?
}

/// GET /api/v1/meals/:id/chart
pub async fn chart_json(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Figure>> {
    Ok(Json(load_figure(state, id).await?))
}

/// GET /api/v1/meals/:id/chart.html
pub async fn chart_html(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Html<String>> {
    let figure = load_figure(state, id).await?;
    let html = figure
        .to_html_div()
        .map_err(|e| ApiError::Internal(format!("Failed to render chart: {}", e)))?;
    Ok(Html(html))
}
