//! Core data types for the event store
//!
//! - `GlucoseReading` and `InsulinDelivery`: the two event series
//! - `Dish` and `Meal`: what was eaten, and when
//! - `Units`: exact insulin amounts in hundredths of a unit
//! - `TimeWindow`: the inclusive interval used to correlate events with a meal

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum length of a dish description
pub const MAX_DISH_DESCRIPTION: usize = 200;

/// Default hours before the anchor included in a window
pub const DEFAULT_PRE_HOURS: i64 = 1;

/// Default hours after the anchor included in a window
pub const DEFAULT_POST_HOURS: i64 = 6;

/// Naive instant to the integer key stored in SQLite
///
/// Pump clocks carry no timezone, so the instant is read on a UTC clock
/// purely to get a monotonic integer. No conversion happens.
pub fn to_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

/// Inverse of [`to_millis`]
pub fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Insulin amount, stored exactly as hundredths of a unit
///
/// Holds at most five digits with two decimal places (0.00 to 999.99).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Units(i64);

impl Units {
    /// Largest representable amount, in hundredths
    pub const MAX_HUNDREDTHS: i64 = 99_999;

    pub fn from_hundredths(hundredths: i64) -> Option<Self> {
        (0..=Self::MAX_HUNDREDTHS)
            .contains(&hundredths)
            .then_some(Self(hundredths))
    }

    /// Round a floating-point amount to two decimal places
    pub fn from_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        Self::from_hundredths((amount * 100.0).round() as i64)
    }

    pub fn hundredths(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Units {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Units::from_f64(amount).ok_or_else(|| {
            serde::de::Error::custom(format!("insulin amount out of range: {}", amount))
        })
    }
}

/// Seconds (fractional allowed) on the wire, `chrono::Duration` in memory
pub mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.num_milliseconds() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::milliseconds((secs * 1000.0).round() as i64))
    }
}

/// A CGM glucose measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub timestamp: NaiveDateTime,
    /// Estimated glucose value in mg/dL
    pub value: i64,
}

impl GlucoseReading {
    pub fn new(timestamp: NaiveDateTime, value: i64) -> Self {
        Self { timestamp, value }
    }
}

impl fmt::Display for GlucoseReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} mg/dL", self.timestamp, self.value)
    }
}

/// An insulin delivery (bolus) from the pump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsulinDelivery {
    pub timestamp: NaiveDateTime,
    pub amount: Units,
    /// Delivery span; zero for a point bolus
    #[serde(default = "Duration::zero", with = "duration_seconds")]
    pub duration: Duration,
}

impl InsulinDelivery {
    /// A point bolus with zero duration
    pub fn new(timestamp: NaiveDateTime, amount: Units) -> Self {
        Self {
            timestamp,
            amount,
            duration: Duration::zero(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

impl fmt::Display for InsulinDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} units", self.timestamp, self.amount)?;
        if !self.duration.is_zero() {
            write!(f, " over {}s", self.duration.num_seconds())?;
        }
        Ok(())
    }
}

/// A stored event series record with its row identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow<T> {
    pub id: i64,
    #[serde(flatten)]
    pub record: T,
}

/// Result of a conditional insert into an event series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row created with this id
    Inserted(i64),
    /// Another row already holds the timestamp; nothing written
    Conflict,
}

/// A dish that meals refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub description: String,
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// One occasion a dish was eaten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub id: i64,
    pub dish_id: i64,
    /// Time the meal started
    pub timestamp: NaiveDateTime,
    /// Meal time is only approximate
    #[serde(default)]
    pub approximate: bool,
}

impl Meal {
    /// The default window of events around this meal, `None` at the ends of
    /// the representable time range
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::around(self.timestamp, DEFAULT_PRE_HOURS, DEFAULT_POST_HOURS)
    }
}

/// A meal to be recorded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewMeal {
    pub dish_id: i64,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub approximate: bool,
}

/// Inclusive time interval `[begin, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { begin, end }
    }

    /// `[anchor - pre_hours, anchor + post_hours]`, `None` when either end
    /// falls outside the representable time range
    pub fn around(anchor: NaiveDateTime, pre_hours: i64, post_hours: i64) -> Option<Self> {
        let begin = anchor.checked_sub_signed(Duration::try_hours(pre_hours)?)?;
        let end = anchor.checked_add_signed(Duration::try_hours(post_hours)?)?;
        Some(Self { begin, end })
    }

    /// Both ends inclusive
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.begin && ts <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_millis_roundtrip_keeps_wall_clock() {
        let ts = at(23, 59, 30);
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
        assert!(to_millis(at(1, 0, 0)) < to_millis(at(1, 0, 1)));
    }

    #[test]
    fn test_units_rounding_and_bounds() {
        assert_eq!(Units::from_f64(3.456).unwrap().hundredths(), 346);
        assert_eq!(Units::from_f64(0.1).unwrap().to_string(), "0.10");
        assert_eq!(Units::from_f64(12.0).unwrap().to_string(), "12.00");
        assert!(Units::from_f64(-1.0).is_none());
        assert!(Units::from_f64(1000.0).is_none());
        assert!(Units::from_f64(f64::NAN).is_none());
        assert!(Units::from_f64(999.99).is_some());
    }

    #[test]
    fn test_units_serde() {
        let u: Units = serde_json::from_str("2.5").unwrap();
        assert_eq!(u.hundredths(), 250);
        assert_eq!(serde_json::to_string(&u).unwrap(), "2.5");
        assert!(serde_json::from_str::<Units>("-0.5").is_err());
    }

    #[test]
    fn test_insulin_display() {
        let point = InsulinDelivery::new(at(7, 0, 0), Units::from_hundredths(350).unwrap());
        assert_eq!(point.to_string(), "2024-01-08 07:00:00: 3.50 units");

        let extended = point.with_duration(Duration::hours(1));
        assert_eq!(extended.to_string(), "2024-01-08 07:00:00: 3.50 units over 3600s");
    }

    #[test]
    fn test_insulin_deserialize_defaults_duration() {
        let d: InsulinDelivery =
            serde_json::from_str(r#"{"timestamp": "2024-01-08T07:00:00", "amount": 1.25}"#)
                .unwrap();
        assert!(d.duration.is_zero());
        assert_eq!(d.amount.hundredths(), 125);
    }

    #[test]
    fn test_window_inclusive() {
        let w = TimeWindow::around(at(12, 0, 0), 1, 6).unwrap();
        assert_eq!(w.begin, at(11, 0, 0));
        assert_eq!(w.end, at(18, 0, 0));
        assert!(w.contains(at(11, 0, 0)));
        assert!(w.contains(at(18, 0, 0)));
        assert!(w.contains(at(12, 0, 0)));
        assert!(!w.contains(at(10, 59, 59)));
        assert!(!w.contains(at(18, 0, 1)));
    }

    #[test]
    fn test_meal_window_defaults() {
        let meal = Meal {
            id: 1,
            dish_id: 1,
            timestamp: at(12, 0, 0),
            approximate: false,
        };
        assert_eq!(meal.window(), TimeWindow::around(at(12, 0, 0), 1, 6));
    }

    #[test]
    fn test_window_out_of_range() {
        assert!(TimeWindow::around(at(12, 0, 0), 0, 10_000_000_000).is_none());
        assert!(TimeWindow::around(at(12, 0, 0), i64::MAX, 0).is_none());
        assert!(TimeWindow::around(NaiveDateTime::MAX, 0, 1).is_none());
        assert!(TimeWindow::around(NaiveDateTime::MIN, 1, 0).is_none());
        assert!(TimeWindow::around(NaiveDateTime::MAX, 1, 0).is_some());
    }
}
