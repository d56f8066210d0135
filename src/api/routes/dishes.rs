//! Dish Routes
//!
//! - GET /api/v1/dishes - List all dishes
//! - POST /api/v1/dishes/search - Exact lookup by description
//! - POST /api/v1/dishes - Search-or-create
//! - GET /api/v1/dishes/:id - Get a dish
//! - DELETE /api/v1/dishes/:id - Delete a dish without meals

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DishCreateResponse, DishListResponse, DishRequest, DishSearchResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::Dish;

/// GET /api/v1/dishes
pub async fn list_dishes(State(state): State<Arc<AppState>>) -> ApiResult<Json<DishListResponse>> {
    let dishes = state.store.list_dishes()?;
    Ok(Json(DishListResponse {
        total: dishes.len(),
        dishes,
    }))
}

/// POST /api/v1/dishes/search
///
/// 404 with `suggest_create` set when no dish has this description.
pub async fn search_dish(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DishRequest>,
) -> ApiResult<(StatusCode, Json<DishSearchResponse>)> {
    let description = req.description.trim().to_string();
    let dish = state.store.find_dish(&description)?;

    let status = if dish.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    Ok((
        status,
        Json(DishSearchResponse {
            found: dish.is_some(),
            suggest_create: dish.is_none(),
            dish,
            description,
        }),
    ))
}

/// POST /api/v1/dishes
///
/// 201 when the dish was created, 200 when it already existed.
pub async fn create_dish(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DishRequest>,
) -> ApiResult<(StatusCode, Json<DishCreateResponse>)> {
    let (dish, created) = state.store.search_or_create_dish(&req.description)?;

    if created {
        tracing::info!(dish_id = dish.id, "Created dish {}", dish);
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DishCreateResponse { dish, created })))
}

/// GET /api/v1/dishes/:id
pub async fn get_dish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Dish>> {
    state
        .store
        .get_dish(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Dish with id {} not found", id)))
}

/// DELETE /api/v1/dishes/:id
///
/// 409 while meals reference the dish.
pub async fn delete_dish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.delete_dish(id)?;
    tracing::info!(dish_id = id, "Deleted dish");
    Ok(StatusCode::NO_CONTENT)
}
