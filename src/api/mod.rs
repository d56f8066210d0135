//! Bolus History REST API
//!
//! HTTP API layer built with Axum.
//!
//! # Endpoints
//!
//! ## Dishes
//! - `GET /api/v1/dishes` - List all dishes
//! - `POST /api/v1/dishes/search` - Look up a dish by description
//! - `POST /api/v1/dishes` - Search-or-create a dish
//! - `GET /api/v1/dishes/:id` - Get a dish
//! - `DELETE /api/v1/dishes/:id` - Delete a dish (409 while meals reference it)
//!
//! ## Meals
//! - `GET /api/v1/dishes/:id/meals` - Meal history, most recent first
//! - `POST /api/v1/dishes/:id/meals` - Record a meal
//! - `DELETE /api/v1/meals/:id` - Delete a meal
//! - `GET /api/v1/meals/:id/chart` - Plotly figure JSON
//! - `GET /api/v1/meals/:id/chart.html` - Embeddable chart fragment
//!
//! ## Event series
//! - `GET /api/v1/glucose` - Glucose readings around `anchor`
//! - `GET /api/v1/insulin` - Insulin deliveries around `anchor`
//! - `POST /api/v1/glucose` - Store a reading
//! - `POST /api/v1/insulin` - Store a delivery
//!
//! ## Import
//! - `POST /api/v1/import` - Commit a t:connect therapy event feed
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! Import and chart handlers run on the blocking pool. The remaining
//! handlers issue a single short statement against the store lock and run
//! inline.
//!
//! # Example
//!
//! ```rust,ignore
//! use bolus_history::api::{serve, AppState};
//! use bolus_history::config::ApiConfig;
//! use bolus_history::storage::Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(Store::open("./history.db".as_ref())?);
//!     let config = ApiConfig::default();
//!
//!     serve(AppState::new(store, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Dish routes
        .route("/dishes", get(routes::dishes::list_dishes))
        .route("/dishes", post(routes::dishes::create_dish))
        .route("/dishes/search", post(routes::dishes::search_dish))
        .route("/dishes/:id", get(routes::dishes::get_dish))
        .route("/dishes/:id", delete(routes::dishes::delete_dish))
        // Meal routes
        .route("/dishes/:id/meals", get(routes::meals::list_meals))
        .route("/dishes/:id/meals", post(routes::meals::add_meal))
        .route("/meals/:id", delete(routes::meals::delete_meal))
        .route("/meals/:id/chart", get(routes::chart::chart_json))
        .route("/meals/:id/chart.html", get(routes::chart::chart_html))
        // Event series routes
        .route("/glucose", get(routes::events::glucose_window))
        .route("/glucose", post(routes::events::add_glucose))
        .route("/insulin", get(routes::events::insulin_window))
        .route("/insulin", post(routes::events::add_insulin))
        // Feed import
        .route("/import", post(routes::import::import_feed))
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config);
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Cross-origin access for the configured origins only
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Bolus history API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Bolus history API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
