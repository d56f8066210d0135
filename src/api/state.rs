//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::chart::ChartStyle;
use crate::config::ApiConfig;
use crate::storage::Store;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Event store for meals and event series
    pub store: Arc<Store>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Meal chart appearance
    pub chart_style: Arc<ChartStyle>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: ApiConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            chart_style: Arc::new(ChartStyle::default()),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
