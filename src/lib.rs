//! # Bolus History
//!
//! Correlates meals with CGM glucose readings and pump insulin deliveries
//! imported from Tandem t:connect.
//!
//! ## Features
//!
//! - **Event store**: SQLite tables unique by timestamp, inclusive window queries
//! - **Idempotent import**: re-importing a feed only grows the discard tally
//! - **Meal charts**: Plotly figures of glucose and boluses around a meal
//! - **REST API**: dishes, meals, event windows and feed import over Axum
//!
//! ## Modules
//!
//! - [`storage`]: Event store and entities
//! - [`import`]: Therapy event feed import
//! - [`tandem`]: t:connect retrieval
//! - [`chart`]: Meal chart assembly
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bolus_history::import::{self, TracingReporter};
//! use bolus_history::storage::{GlucoseReading, Store};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open(std::path::Path::new("./history.db"))?;
//!
//!     let feed: serde_json::Value =
//!         serde_json::from_str(&std::fs::read_to_string("./tandem.json")?)?;
//!     let report = import::commit(&store, &feed, &TracingReporter)?;
//!     println!("{} records accepted", report.total_accepted());
//!
//!     println!("{} glucose readings stored", store.count::<GlucoseReading>()?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chart;
pub mod config;
pub mod import;
pub mod logging;
pub mod storage;
pub mod tandem;

// Re-export top-level types for convenience
pub use storage::{
    Dish, GlucoseReading, InsertOutcome, InsulinDelivery, Meal, SeriesKind, SeriesRecord,
    StorageError, StorageResult, StorageStats, Store, TimeWindow, Units,
};

pub use import::{ImportError, ImportReport, ImportReporter, NullReporter, TracingReporter};

pub use tandem::{DateRange, FileSource, TandemClient, TandemError, TandemLogin, TherapyDataSource};

pub use chart::{ChartStyle, Figure};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, LoggingConfig, StorageConfig, TandemConfig};
