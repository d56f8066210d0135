//! Meal Routes
//!
//! - GET /api/v1/dishes/:id/meals - Meal history of a dish
//! - POST /api/v1/dishes/:id/meals - Record a meal
//! - DELETE /api/v1/meals/:id - Delete a meal

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{MealListResponse, MealRequest, MealResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::storage::{Meal, NewMeal};

fn meal_response(state: &AppState, meal: Meal) -> ApiResult<MealResponse> {
    let has_glucose_data = state.store.has_glucose_data(&meal)?;
    Ok(MealResponse {
        meal,
        has_glucose_data,
    })
}

/// GET /api/v1/dishes/:id/meals
pub async fn list_meals(
    State(state): State<Arc<AppState>>,
    Path(dish_id): Path<i64>,
) -> ApiResult<Json<MealListResponse>> {
    let dish = state
        .store
        .get_dish(dish_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Dish with id {} not found", dish_id)))?;

    let meals = state
        .store
        .meals_for_dish(dish_id)?
        .into_iter()
        .map(|meal| meal_response(&state, meal))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(MealListResponse {
        dish,
        total: meals.len(),
        meals,
    }))
}

/// POST /api/v1/dishes/:id/meals
pub async fn add_meal(
    State(state): State<Arc<AppState>>,
    Path(dish_id): Path<i64>,
    Json(req): Json<MealRequest>,
) -> ApiResult<(StatusCode, Json<MealResponse>)> {
    let meal = state.store.add_meal(&NewMeal {
        dish_id,
        timestamp: req.timestamp,
        approximate: req.approximate,
    })?;

    tracing::info!(meal_id = meal.id, dish_id, "Recorded meal at {}", meal.timestamp);

    Ok((StatusCode::CREATED, Json(meal_response(&state, meal)?)))
}

/// DELETE /api/v1/meals/:id
pub async fn delete_meal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.delete_meal(id)?;
    Ok(StatusCode::NO_CONTENT)
}
