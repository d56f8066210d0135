//! t:connect ControlIQ therapy event feed
//!
//! The feed is the JSON document returned by the therapy events query,
//! nested under `ciqEvents`:
//!
//! ```json
//! {"ciqEvents": {"event": [
//!     {"type": "CGM", "eventDateTime": "2024-01-08T00:03:11", "egv": {"estimatedGlucoseValue": 132}},
//!     {"type": "Bolus", "eventDateTime": "2024-01-08T07:31:40", "insulin": "4.25", "extendedBolus": "0"},
//!     {"type": "Basal", "eventDateTime": "2024-01-08T07:35:00"}
//! ]}}
//! ```

use serde::Deserialize;
use serde_json::Value;

/// Feed event kind for glucose readings
pub const KIND_CGM: &str = "CGM";

/// Feed event kind for insulin boluses
pub const KIND_BOLUS: &str = "Bolus";

/// Kind-specific payload of a therapy event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Cgm {
        egv: i64,
    },
    Bolus {
        insulin: f64,
        /// Record carries extended-bolus duration data
        extended: bool,
    },
    /// Any kind this application does not store
    Other,
}

/// One normalized event from the feed
#[derive(Debug, Clone, PartialEq)]
pub struct TherapyEvent {
    pub kind: String,
    /// Unparsed pump clock time
    pub event_date_time: String,
    pub payload: EventPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    event_date_time: String,
    #[serde(default)]
    egv: Option<Value>,
    #[serde(default)]
    insulin: Option<Value>,
    #[serde(default, alias = "extended_bolus")]
    extended_bolus: Option<Value>,
}

impl TherapyEvent {
    /// Normalize one raw feed element
    pub fn parse(raw: &Value) -> Result<Self, String> {
        let event = RawEvent::deserialize(raw).map_err(|e| e.to_string())?;

        let payload = match event.kind.as_str() {
            KIND_CGM => {
                let egv = event
                    .egv
                    .as_ref()
                    .and_then(glucose_value)
                    .ok_or_else(|| "CGM event without a usable egv".to_string())?;
                EventPayload::Cgm { egv }
            }
            KIND_BOLUS => {
                let insulin = event
                    .insulin
                    .as_ref()
                    .and_then(number)
                    .ok_or_else(|| "Bolus event without a usable insulin amount".to_string())?;
                EventPayload::Bolus {
                    insulin,
                    extended: event.extended_bolus.as_ref().map(truthy).unwrap_or(false),
                }
            }
            _ => EventPayload::Other,
        };

        Ok(TherapyEvent {
            kind: event.kind,
            event_date_time: event.event_date_time,
            payload,
        })
    }
}

/// The raw event array at `ciqEvents.event`
pub fn feed_events(feed: &Value) -> Option<&Vec<Value>> {
    feed.get("ciqEvents")?.get("event")?.as_array()
}

/// `egv` is either a bare number or `{"estimatedGlucoseValue": n}`
fn glucose_value(egv: &Value) -> Option<i64> {
    let value = match egv {
        Value::Object(map) => map.get("estimatedGlucoseValue")?,
        other => other,
    };
    number(value).map(|v| v.round() as i64)
}

/// Numbers may arrive as JSON numbers or numeric strings
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cgm_nested_egv() {
        let ev = TherapyEvent::parse(&json!({
            "type": "CGM",
            "eventDateTime": "2024-01-08T00:03:11",
            "egv": {"estimatedGlucoseValue": 132}
        }))
        .unwrap();
        assert_eq!(ev.kind, "CGM");
        assert_eq!(ev.event_date_time, "2024-01-08T00:03:11");
        assert_eq!(ev.payload, EventPayload::Cgm { egv: 132 });
    }

    #[test]
    fn test_parse_cgm_bare_egv() {
        let ev = TherapyEvent::parse(&json!({
            "type": "CGM", "eventDateTime": "2024-01-08T00:03:11", "egv": 98
        }))
        .unwrap();
        assert_eq!(ev.payload, EventPayload::Cgm { egv: 98 });
    }

    #[test]
    fn test_parse_bolus_string_amount() {
        let ev = TherapyEvent::parse(&json!({
            "type": "Bolus", "eventDateTime": "2024-01-08T07:31:40",
            "insulin": "4.25", "extendedBolus": "0"
        }))
        .unwrap();
        assert_eq!(
            ev.payload,
            EventPayload::Bolus {
                insulin: 4.25,
                extended: false
            }
        );
    }

    #[test]
    fn test_parse_extended_marker_variants() {
        for marker in [json!(true), json!("1"), json!(1), json!({"duration": 60})] {
            let ev = TherapyEvent::parse(&json!({
                "type": "Bolus", "eventDateTime": "2024-01-08T07:31:40",
                "insulin": 2.0, "extended_bolus": marker
            }))
            .unwrap();
            assert!(matches!(ev.payload, EventPayload::Bolus { extended: true, .. }));
        }
    }

    #[test]
    fn test_parse_other_kind() {
        let ev = TherapyEvent::parse(&json!({
            "type": "Basal", "eventDateTime": "2024-01-08T07:35:00", "rate": 0.8
        }))
        .unwrap();
        assert_eq!(ev.payload, EventPayload::Other);
    }

    #[test]
    fn test_parse_rejects_incomplete_records() {
        assert!(TherapyEvent::parse(&json!({"eventDateTime": "2024-01-08T07:35:00"})).is_err());
        assert!(TherapyEvent::parse(&json!({"type": "CGM", "eventDateTime": "x"})).is_err());
        assert!(TherapyEvent::parse(&json!({"type": "Bolus", "eventDateTime": "x"})).is_err());
        assert!(TherapyEvent::parse(&json!("CGM")).is_err());
    }

    #[test]
    fn test_feed_events() {
        let feed = json!({"ciqEvents": {"event": [{"type": "CGM"}]}});
        assert_eq!(feed_events(&feed).map(|v| v.len()), Some(1));

        assert!(feed_events(&json!({"ciqEvents": {}})).is_none());
        assert!(feed_events(&json!({"ciqEvents": {"event": {}}})).is_none());
        assert!(feed_events(&json!([])).is_none());
    }
}
