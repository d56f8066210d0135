//! Event Store
//!
//! This module provides persistence for meals and the two event series:
//!
//! - **types**: Entities (GlucoseReading, InsulinDelivery, Dish, Meal, TimeWindow)
//! - **series**: How each event series maps onto its table
//! - **store**: SQLite repository (conditional insert, range query, dishes, meals)
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Record → transaction { INSERT .. ON CONFLICT(timestamp) DO NOTHING } → Inserted | Conflict
//!
//! Read Path:
//!   anchor ± hours → TimeWindow → SELECT .. WHERE begin <= timestamp <= end ORDER BY timestamp
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bolus_history::storage::{GlucoseReading, Store};
//! use chrono::NaiveDate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open(std::path::Path::new("./history.db"))?;
//!
//!     let t = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(12, 0, 0).unwrap();
//!     store.insert(&GlucoseReading::new(t, 112))?;
//!
//!     let readings = store.events_in_window::<GlucoseReading>(t, 1, 6)?;
//!     println!("{} readings around {}", readings.len(), t);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod series;
pub mod store;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use series::{SeriesKind, SeriesRecord};
pub use store::{StorageStats, Store};
pub use types::{
    Dish, GlucoseReading, InsertOutcome, InsulinDelivery, Meal, NewMeal, SeriesRow, TimeWindow,
    Units, DEFAULT_POST_HOURS, DEFAULT_PRE_HOURS, MAX_DISH_DESCRIPTION,
};
