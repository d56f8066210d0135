//! Retrieval date range
//!
//! Resolves the `--start` / `--end` / `--days` combination of the import
//! command into a concrete `[start, end)` interval.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Invalid combinations of range bounds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("--days value must be greater than 0")]
    DaysNotPositive,

    #[error("May specify only two from (--start, --end, --days)")]
    TooManyBounds,

    #[error("Must specify at least one from (--start, --days)")]
    MissingBounds,

    #[error("--start date may not be in the future")]
    StartInFuture,

    #[error("--end date must be later than --start date")]
    EndBeforeStart,

    #[error("Date range {0} is empty")]
    Empty(String),

    #[error("Could not parse date: {0}")]
    Unparseable(String),

    #[error("Date range does not fit the calendar")]
    OutOfRange,
}

/// A resolved retrieval interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn span(days: i64) -> Result<Duration, RangeError> {
    Duration::try_days(days).ok_or(RangeError::OutOfRange)
}

fn floor_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}

/// Parse a command-line date: `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` or
/// `YYYY-MM-DD HH:MM[:SS]`
pub fn parse_date_arg(raw: &str) -> Result<NaiveDateTime, RangeError> {
    let raw = raw.trim();
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| RangeError::Unparseable(raw.to_string()))
}

impl DateRange {
    /// Resolve bounds relative to `now`
    ///
    /// - `start` is floored to midnight and may not be in the future
    /// - with `start`: end is `start + days`, else `end`, else `now`
    /// - without `start`: end is `end` or `now`, start is `end - days` floored
    pub fn resolve(
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        days: Option<i64>,
        now: NaiveDateTime,
    ) -> Result<Self, RangeError> {
        if matches!(days, Some(d) if d <= 0) {
            return Err(RangeError::DaysNotPositive);
        }

        let range = match (start, days) {
            (Some(start), _) => {
                if end.is_some() && days.is_some() {
                    return Err(RangeError::TooManyBounds);
                }
                let start = floor_day(start);
                if start > now {
                    return Err(RangeError::StartInFuture);
                }
                let end = match (days, end) {
                    (Some(days), _) => start
                        .checked_add_signed(span(days)?)
                        .ok_or(RangeError::OutOfRange)?,
                    (None, Some(end)) => {
                        if end < start {
                            return Err(RangeError::EndBeforeStart);
                        }
                        end
                    }
                    (None, None) => now,
                };
                DateRange { start, end }
            }
            (None, Some(days)) => {
                let end = end.unwrap_or(now);
                let start = end
                    .checked_sub_signed(span(days)?)
                    .ok_or(RangeError::OutOfRange)?;
                DateRange {
                    start: floor_day(start),
                    end,
                }
            }
            (None, None) => return Err(RangeError::MissingBounds),
        };

        if range.start >= range.end {
            return Err(RangeError::Empty(range.to_string()));
        }
        Ok(range)
    }

    /// Dates as the t:connect API expects them
    pub fn api_dates(&self) -> (String, String) {
        (
            self.start.format("%m-%d-%Y").to_string(),
            self.end.format("%m-%d-%Y").to_string(),
        )
    }
}
