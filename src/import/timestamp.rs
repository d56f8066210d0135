//! Pump clock timestamps
//!
//! The t:slim clock is not timezone aware. Users are assumed to adjust the
//! pump for daylight saving and travel, so timestamps are kept as naive
//! local time and never converted.

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})(\.\d+)?$")
            .expect("timestamp pattern is valid")
    })
}

/// Parse `YYYY-MM-DDTHH:MM:SS` with an optional fractional-seconds suffix.
///
/// The fraction is accepted but dropped. Returns `None` for any other shape,
/// including an out-of-range calendar value.
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let caps = pattern().captures(raw)?;
    let whole = caps.get(1)?.as_str();
    NaiveDateTime::parse_from_str(whole, "%Y-%m-%dT%H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expected() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_plain() {
        assert_eq!(parse_event_time("2024-01-08T07:05:09"), Some(expected()));
    }

    #[test]
    fn test_fraction_dropped() {
        assert_eq!(parse_event_time("2024-01-08T07:05:09.5"), Some(expected()));
        assert_eq!(parse_event_time("2024-01-08T07:05:09.123456"), Some(expected()));
    }

    #[test]
    fn test_rejects_other_shapes() {
        for raw in [
            "",
            "2024-01-08",
            "2024-01-08 07:05:09",
            "2024-01-08T07:05",
            "2024-01-08T07:05:09Z",
            "2024-01-08T07:05:09+01:00",
            "2024-01-08T07:05:09.",
            " 2024-01-08T07:05:09",
            "2024-1-8T7:05:09",
        ] {
            assert_eq!(parse_event_time(raw), None, "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert_eq!(parse_event_time("2024-02-30T07:05:09"), None);
        assert_eq!(parse_event_time("2024-01-08T25:05:09"), None);
    }
}
