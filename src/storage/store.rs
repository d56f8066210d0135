//! SQLite-backed event store
//!
//! One connection behind a mutex. Every write is a single statement or a
//! single short transaction, so the lock is never held across records.
//!
//! # Tables
//! - `glucose_readings`, `insulin_deliveries`: event series, `timestamp UNIQUE`
//! - `dishes`: `description UNIQUE`
//! - `meals`: `dish_id REFERENCES dishes(id) ON DELETE RESTRICT`

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::series::{timestamp_column, SeriesRecord};
use crate::storage::types::{
    to_millis, Dish, GlucoseReading, InsertOutcome, InsulinDelivery, Meal, NewMeal, SeriesRow,
    TimeWindow, MAX_DISH_DESCRIPTION,
};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_VERSION: i64 = 1;

/// Row counts per table
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub glucose_readings: u64,
    pub insulin_deliveries: u64,
    pub dishes: u64,
    pub meals: u64,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} glucose readings, {} insulin deliveries, {} dishes, {} meals",
            self.glucose_readings, self.insulin_deliveries, self.dishes, self.meals
        )
    }
}

/// The event store
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Create or open a database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Readers proceed while an import is writing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.migrate()?;

        tracing::debug!(path = %path.display(), "Opened event store");
        Ok(store)
    }

    /// Private in-memory database, used by tests
    pub fn open_in_memory() -> StorageResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(format!("store connection poisoned: {}", e)))
    }

    fn migrate(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS glucose_readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp INTEGER NOT NULL UNIQUE,
                    value INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS insulin_deliveries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp INTEGER NOT NULL UNIQUE,
                    amount_hundredths INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS dishes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    description TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    dish_id INTEGER NOT NULL REFERENCES dishes(id) ON DELETE RESTRICT,
                    timestamp INTEGER NOT NULL,
                    approximate INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_meals_dish ON meals(dish_id, timestamp);",
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::info!(version = SCHEMA_VERSION, "Migrated event store schema");
        }

        Ok(())
    }

    // ============================================
    // EVENT SERIES
    // ============================================

    /// Insert a record in its own transaction, reporting a timestamp collision
    /// as `InsertOutcome::Conflict` instead of an error
    pub fn try_insert<T: SeriesRecord>(&self, record: &T) -> StorageResult<InsertOutcome> {
        let placeholders: Vec<String> = (0..T::COLUMNS.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "INSERT INTO {} (timestamp, {}) VALUES (?1, {})
             ON CONFLICT(timestamp) DO NOTHING",
            T::TABLE,
            T::COLUMNS.join(", "),
            placeholders.join(", ")
        );

        let mut values = Vec::with_capacity(T::COLUMNS.len() + 1);
        values.push(Value::Integer(to_millis(record.timestamp())));
        values.extend(record.bind());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = {
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(values))?
        };
        let outcome = if changed == 0 {
            InsertOutcome::Conflict
        } else {
            InsertOutcome::Inserted(tx.last_insert_rowid())
        };
        tx.commit()?;

        Ok(outcome)
    }

    /// Insert a record, failing with `DuplicateTimestamp` on collision
    pub fn insert<T: SeriesRecord>(&self, record: &T) -> StorageResult<i64> {
        match self.try_insert(record)? {
            InsertOutcome::Inserted(id) => Ok(id),
            InsertOutcome::Conflict => Err(StorageError::DuplicateTimestamp {
                series: T::TABLE,
                timestamp: record.timestamp().to_string(),
            }),
        }
    }

    /// The record stored at exactly this timestamp
    pub fn get_at<T: SeriesRecord>(
        &self,
        timestamp: NaiveDateTime,
    ) -> StorageResult<Option<SeriesRow<T>>> {
        let sql = format!(
            "SELECT id, timestamp, {} FROM {} WHERE timestamp = ?1",
            T::COLUMNS.join(", "),
            T::TABLE
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let row = stmt
            .query_row(params![to_millis(timestamp)], series_row::<T>)
            .optional()?;
        Ok(row)
    }

    /// All records with `window.begin <= timestamp <= window.end`, ascending
    pub fn query_range<T: SeriesRecord>(
        &self,
        window: TimeWindow,
    ) -> StorageResult<Vec<SeriesRow<T>>> {
        let sql = format!(
            "SELECT id, timestamp, {} FROM {}
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC",
            T::COLUMNS.join(", "),
            T::TABLE
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![to_millis(window.begin), to_millis(window.end)],
            series_row::<T>,
        )?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Events around `anchor`: `[anchor - pre_hours, anchor + post_hours]`
    pub fn events_in_window<T: SeriesRecord>(
        &self,
        anchor: NaiveDateTime,
        pre_hours: i64,
        post_hours: i64,
    ) -> StorageResult<Vec<SeriesRow<T>>> {
        let window = TimeWindow::around(anchor, pre_hours, post_hours).ok_or_else(|| {
            StorageError::InvalidValue(format!(
                "window -{}h/+{}h around {} is out of range",
                pre_hours, post_hours, anchor
            ))
        })?;
        self.query_range(window)
    }

    /// Number of records in a series
    pub fn count<T: SeriesRecord>(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", T::TABLE), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    }

    // ============================================
    // DISHES
    // ============================================

    pub fn list_dishes(&self) -> StorageResult<Vec<Dish>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, description FROM dishes ORDER BY description")?;
        let rows = stmt.query_map([], dish_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_dish(&self, id: i64) -> StorageResult<Option<Dish>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT id, description FROM dishes WHERE id = ?1")?;
        Ok(stmt.query_row(params![id], dish_row).optional()?)
    }

    /// Exact-match lookup by description
    pub fn find_dish(&self, description: &str) -> StorageResult<Option<Dish>> {
        let description = validate_description(description)?;
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, description FROM dishes WHERE description = ?1")?;
        Ok(stmt.query_row(params![description], dish_row).optional()?)
    }

    /// Create a dish, failing with `DuplicateDish` when it already exists
    pub fn create_dish(&self, description: &str) -> StorageResult<Dish> {
        let description = validate_description(description)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT INTO dishes (description) VALUES (?1)
             ON CONFLICT(description) DO NOTHING",
            params![description],
        )?;
        if changed == 0 {
            return Err(StorageError::DuplicateDish(description.to_string()));
        }

        Ok(Dish {
            id: conn.last_insert_rowid(),
            description: description.to_string(),
        })
    }

    /// Return the dish with this description, creating it if needed.
    /// The flag is true when the dish was created.
    pub fn search_or_create_dish(&self, description: &str) -> StorageResult<(Dish, bool)> {
        let description = validate_description(description)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, description FROM dishes WHERE description = ?1",
                params![description],
                dish_row,
            )
            .optional()?;

        let result = match existing {
            Some(dish) => (dish, false),
            None => {
                tx.execute(
                    "INSERT INTO dishes (description) VALUES (?1)",
                    params![description],
                )?;
                let dish = Dish {
                    id: tx.last_insert_rowid(),
                    description: description.to_string(),
                };
                (dish, true)
            }
        };
        tx.commit()?;

        Ok(result)
    }

    /// Delete a dish. Fails with `Protected` while any meal references it.
    pub fn delete_dish(&self, id: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        match conn.execute("DELETE FROM dishes WHERE id = ?1", params![id]) {
            Ok(0) => Err(StorageError::NotFound(format!("dish {}", id))),
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => Err(StorageError::Protected(format!(
                "dish {} is referenced by recorded meals",
                id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    // ============================================
    // MEALS
    // ============================================

    pub fn add_meal(&self, meal: &NewMeal) -> StorageResult<Meal> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO meals (dish_id, timestamp, approximate) VALUES (?1, ?2, ?3)",
            params![meal.dish_id, to_millis(meal.timestamp), meal.approximate],
        );

        match result {
            Ok(_) => Ok(Meal {
                id: conn.last_insert_rowid(),
                dish_id: meal.dish_id,
                timestamp: meal.timestamp,
                approximate: meal.approximate,
            }),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StorageError::NotFound(format!("dish {}", meal.dish_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_meal(&self, id: i64) -> StorageResult<Option<Meal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, dish_id, timestamp, approximate FROM meals WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], meal_row).optional()?)
    }

    /// Meals of one dish, most recent first
    pub fn meals_for_dish(&self, dish_id: i64) -> StorageResult<Vec<Meal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, dish_id, timestamp, approximate FROM meals
             WHERE dish_id = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![dish_id], meal_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_meal(&self, id: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("meal {}", id)));
        }
        Ok(())
    }

    /// True when the meal's default window holds any glucose reading
    pub fn has_glucose_data(&self, meal: &Meal) -> StorageResult<bool> {
        let Some(window) = meal.window() else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM glucose_readings WHERE timestamp >= ?1 AND timestamp <= ?2)",
            params![to_millis(window.begin), to_millis(window.end)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn stats(&self) -> StorageResult<StorageStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> StorageResult<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StorageStats {
            glucose_readings: count(GlucoseReading::TABLE)?,
            insulin_deliveries: count(InsulinDelivery::TABLE)?,
            dishes: count("dishes")?,
            meals: count("meals")?,
        })
    }
}

fn series_row<T: SeriesRecord>(row: &Row<'_>) -> rusqlite::Result<SeriesRow<T>> {
    let timestamp = timestamp_column(row, 1)?;
    Ok(SeriesRow {
        id: row.get(0)?,
        record: T::from_row(timestamp, row)?,
    })
}

fn dish_row(row: &Row<'_>) -> rusqlite::Result<Dish> {
    Ok(Dish {
        id: row.get(0)?,
        description: row.get(1)?,
    })
}

fn meal_row(row: &Row<'_>) -> rusqlite::Result<Meal> {
    Ok(Meal {
        id: row.get(0)?,
        dish_id: row.get(1)?,
        timestamp: timestamp_column(row, 2)?,
        approximate: row.get(3)?,
    })
}

fn validate_description(description: &str) -> StorageResult<&str> {
    let description = description.trim();
    if description.is_empty() {
        return Err(StorageError::InvalidValue(
            "dish description cannot be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_DISH_DESCRIPTION {
        return Err(StorageError::InvalidValue(format!(
            "dish description exceeds {} characters",
            MAX_DISH_DESCRIPTION
        )));
    }
    Ok(description)
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::Units;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_and_get_at() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert(&GlucoseReading::new(at(7, 0), 120)).unwrap();

        let row = store.get_at::<GlucoseReading>(at(7, 0)).unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.record.value, 120);

        assert!(store.get_at::<GlucoseReading>(at(7, 5)).unwrap().is_none());
    }

    #[test]
    fn test_try_insert_reports_conflict() {
        let store = Store::open_in_memory().unwrap();
        let first = store.try_insert(&GlucoseReading::new(at(7, 0), 120)).unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = store.try_insert(&GlucoseReading::new(at(7, 0), 140)).unwrap();
        assert_eq!(second, InsertOutcome::Conflict);

        // Original row untouched
        let row = store.get_at::<GlucoseReading>(at(7, 0)).unwrap().unwrap();
        assert_eq!(row.record.value, 120);
    }

    #[test]
    fn test_series_are_independent() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&GlucoseReading::new(at(7, 0), 120)).unwrap();
        store
            .insert(&InsulinDelivery::new(at(7, 0), Units::from_hundredths(300).unwrap()))
            .unwrap();

        assert_eq!(store.count::<GlucoseReading>().unwrap(), 1);
        assert_eq!(store.count::<InsulinDelivery>().unwrap(), 1);
    }

    #[test]
    fn test_insulin_roundtrip_keeps_duration() {
        let store = Store::open_in_memory().unwrap();
        let delivery = InsulinDelivery::new(at(12, 0), Units::from_hundredths(425).unwrap())
            .with_duration(Duration::minutes(90));
        store.insert(&delivery).unwrap();

        let row = store.get_at::<InsulinDelivery>(at(12, 0)).unwrap().unwrap();
        assert_eq!(row.record, delivery);
    }

    #[test]
    fn test_window_empty() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&GlucoseReading::new(at(1, 0), 90)).unwrap();

        let rows = store
            .events_in_window::<GlucoseReading>(at(12, 0), 1, 6)
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_window_out_of_range_is_invalid() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&GlucoseReading::new(at(12, 0), 90)).unwrap();

        assert!(matches!(
            store.events_in_window::<GlucoseReading>(at(12, 0), 1, 10_000_000_000),
            Err(StorageError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_window_includes_boundaries_and_anchor() {
        let store = Store::open_in_memory().unwrap();
        for (ts, v) in [(at(10, 59), 1), (at(11, 0), 2), (at(12, 0), 3), (at(18, 0), 4)] {
            store.insert(&GlucoseReading::new(ts, v)).unwrap();
        }
        store
            .insert(&GlucoseReading::new(at(18, 0) + Duration::seconds(1), 5))
            .unwrap();

        let values: Vec<i64> = store
            .events_in_window::<GlucoseReading>(at(12, 0), 1, 6)
            .unwrap()
            .into_iter()
            .map(|r| r.record.value)
            .collect();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[test]
    fn test_dish_search_or_create() {
        let store = Store::open_in_memory().unwrap();
        let (dish, created) = store.search_or_create_dish("  Pad thai ").unwrap();
        assert!(created);
        assert_eq!(dish.description, "Pad thai");

        let (again, created) = store.search_or_create_dish("Pad thai").unwrap();
        assert!(!created);
        assert_eq!(again.id, dish.id);

        assert!(matches!(
            store.create_dish("Pad thai"),
            Err(StorageError::DuplicateDish(_))
        ));
    }

    #[test]
    fn test_dish_description_validation() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.create_dish("   "),
            Err(StorageError::InvalidValue(_))
        ));
        let long = "x".repeat(MAX_DISH_DESCRIPTION + 1);
        assert!(matches!(
            store.create_dish(&long),
            Err(StorageError::InvalidValue(_))
        ));
        assert!(store.create_dish(&"x".repeat(MAX_DISH_DESCRIPTION)).is_ok());
    }

    #[test]
    fn test_meals_most_recent_first() {
        let store = Store::open_in_memory().unwrap();
        let dish = store.create_dish("Oatmeal").unwrap();
        for h in [7, 9, 8] {
            store
                .add_meal(&NewMeal {
                    dish_id: dish.id,
                    timestamp: at(h, 0),
                    approximate: false,
                })
                .unwrap();
        }

        let hours: Vec<NaiveDateTime> = store
            .meals_for_dish(dish.id)
            .unwrap()
            .into_iter()
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(hours, vec![at(9, 0), at(8, 0), at(7, 0)]);
    }

    #[test]
    fn test_add_meal_unknown_dish() {
        let store = Store::open_in_memory().unwrap();
        let result = store.add_meal(&NewMeal {
            dish_id: 42,
            timestamp: at(7, 0),
            approximate: true,
        });
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_unreferenced_dish() {
        let store = Store::open_in_memory().unwrap();
        let dish = store.create_dish("Toast").unwrap();
        store.delete_dish(dish.id).unwrap();
        assert!(store.get_dish(dish.id).unwrap().is_none());
        assert!(matches!(
            store.delete_dish(dish.id),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_has_glucose_data() {
        let store = Store::open_in_memory().unwrap();
        let dish = store.create_dish("Soup").unwrap();
        let meal = store
            .add_meal(&NewMeal {
                dish_id: dish.id,
                timestamp: at(12, 0),
                approximate: false,
            })
            .unwrap();
        assert!(!store.has_glucose_data(&meal).unwrap());

        store.insert(&GlucoseReading::new(at(17, 30), 150)).unwrap();
        assert!(store.has_glucose_data(&meal).unwrap());
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        {
            let store = Store::open(&path).unwrap();
            store.insert(&GlucoseReading::new(at(7, 0), 101)).unwrap();
            store.create_dish("Rice").unwrap();
        }

        {
            let store = Store::open(&path).unwrap();
            let stats = store.stats().unwrap();
            assert_eq!(stats.glucose_readings, 1);
            assert_eq!(stats.dishes, 1);
            assert_eq!(store.path(), Some(path.as_path()));
        }
    }
}
