//! Event series table mapping
//!
//! Each series is a table keyed by a unique timestamp. `SeriesRecord` tells the
//! generic repository functions in [`Store`](super::Store) how to bind and read
//! the non-identity columns of one series.

use crate::storage::types::{from_millis, GlucoseReading, InsulinDelivery, Units};
use chrono::{Duration, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two independently unique-by-timestamp event collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Glucose,
    Insulin,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::Glucose => write!(f, "glucose"),
            SeriesKind::Insulin => write!(f, "insulin"),
        }
    }
}

impl std::str::FromStr for SeriesKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "glucose" | "cgm" | "egv" => Ok(SeriesKind::Glucose),
            "insulin" | "bolus" => Ok(SeriesKind::Insulin),
            other => Err(format!("unknown series: {}", other)),
        }
    }
}

/// A record type stored in an event series table
///
/// Column order in `COLUMNS`, `bind` and `from_row` must agree. The timestamp
/// column is handled by the store and is not listed.
pub trait SeriesRecord: Sized + Clone + PartialEq + fmt::Display {
    const KIND: SeriesKind;
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn timestamp(&self) -> NaiveDateTime;

    /// Values for `COLUMNS`, in order
    fn bind(&self) -> Vec<Value>;

    /// Build a record from a row selected as `id, timestamp, COLUMNS...`
    fn from_row(timestamp: NaiveDateTime, row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Read the timestamp at `idx` as a naive instant
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let ms: i64 = row.get(idx)?;
    from_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {}", ms).into(),
        )
    })
}

impl SeriesRecord for GlucoseReading {
    const KIND: SeriesKind = SeriesKind::Glucose;
    const TABLE: &'static str = "glucose_readings";
    const COLUMNS: &'static [&'static str] = &["value"];

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn bind(&self) -> Vec<Value> {
        vec![Value::Integer(self.value)]
    }

    fn from_row(timestamp: NaiveDateTime, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(GlucoseReading {
            timestamp,
            value: row.get(2)?,
        })
    }
}

impl SeriesRecord for InsulinDelivery {
    const KIND: SeriesKind = SeriesKind::Insulin;
    const TABLE: &'static str = "insulin_deliveries";
    const COLUMNS: &'static [&'static str] = &["amount_hundredths", "duration_ms"];

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn bind(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.amount.hundredths()),
            Value::Integer(self.duration.num_milliseconds()),
        ]
    }

    fn from_row(timestamp: NaiveDateTime, row: &Row<'_>) -> rusqlite::Result<Self> {
        let hundredths: i64 = row.get(2)?;
        let amount = Units::from_hundredths(hundredths).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("insulin amount out of range: {}", hundredths).into(),
            )
        })?;
        let duration_ms: i64 = row.get(3)?;

        Ok(InsulinDelivery {
            timestamp,
            amount,
            duration: Duration::milliseconds(duration_ms),
        })
    }
}
