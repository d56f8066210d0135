//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::import::ImportReport;
use crate::storage::{Dish, Meal, SeriesRow, StorageStats};

// ============================================
// DISH DTOs
// ============================================

/// Dish lookup or creation request
#[derive(Debug, Deserialize)]
pub struct DishRequest {
    /// Free-text dish description
    pub description: String,
}

/// All dishes
#[derive(Debug, Serialize)]
pub struct DishListResponse {
    pub total: usize,
    pub dishes: Vec<Dish>,
}

/// Result of a dish search
#[derive(Debug, Serialize)]
pub struct DishSearchResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dish: Option<Dish>,
    /// Normalized description that was searched for
    pub description: String,
    /// No match; the client may offer to create the dish
    pub suggest_create: bool,
}

/// Result of search-or-create
#[derive(Debug, Serialize)]
pub struct DishCreateResponse {
    pub dish: Dish,
    /// False when an existing dish matched
    pub created: bool,
}

// ============================================
// MEAL DTOs
// ============================================

/// New meal for a dish
#[derive(Debug, Deserialize)]
pub struct MealRequest {
    /// Local time the meal started
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub approximate: bool,
}

/// Meal with chart availability
#[derive(Debug, Serialize)]
pub struct MealResponse {
    #[serde(flatten)]
    pub meal: Meal,
    /// A chart can be drawn for this meal
    pub has_glucose_data: bool,
}

/// Meal history of one dish
#[derive(Debug, Serialize)]
pub struct MealListResponse {
    pub dish: Dish,
    pub total: usize,
    /// Most recent first
    pub meals: Vec<MealResponse>,
}

// ============================================
// EVENT SERIES DTOs
// ============================================

/// Window query parameters
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub anchor: NaiveDateTime,
    /// Hours before the anchor
    #[serde(default)]
    pub pre: Option<i64>,
    /// Hours after the anchor
    #[serde(default)]
    pub post: Option<i64>,
}

/// Events in a window, ascending by timestamp
#[derive(Debug, Serialize)]
pub struct WindowResponse<T> {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub total: usize,
    pub events: Vec<SeriesRow<T>>,
}

/// Stored event identity
#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub id: i64,
}

// ============================================
// IMPORT DTOs
// ============================================

/// Outcome of a feed import
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub report: ImportReport,
    pub total_accepted: usize,
    pub total_discarded: usize,
}

impl From<ImportReport> for ImportResponse {
    fn from(report: ImportReport) -> Self {
        Self {
            total_accepted: report.total_accepted(),
            total_discarded: report.total_discarded(),
            report,
        }
    }
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Storage status
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StorageStats>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
