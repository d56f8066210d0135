//! Therapy Data Import
//!
//! Commits a t:connect therapy event feed into the event store:
//!
//! ```text
//! ciqEvents.event[i] → TherapyEvent → eventDateTime → CGM | Bolus | other
//!                                                      ↓       ↓       ↓
//!                                         GlucoseReading  InsulinDelivery  discarded
//!                                                      ↓
//!                          try_insert (own transaction) → Inserted → accepted
//!                                                      → Conflict → discarded,
//!                                                        compared with the existing row
//! ```
//!
//! Records are independent: a failure on one never stops the run and never
//! rolls back earlier records. Re-importing a feed is a no-op apart from
//! the discard tally.

mod feed;
mod reporter;
mod timestamp;

pub use feed::{feed_events, EventPayload, TherapyEvent, KIND_BOLUS, KIND_CGM};
pub use reporter::{ImportReport, ImportReporter, NullReporter, TracingReporter};
pub use timestamp::parse_event_time;

use crate::storage::{
    GlucoseReading, InsertOutcome, InsulinDelivery, SeriesRecord, Store, Units,
};
use serde_json::Value;

/// Errors that stop an import before any record is processed
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unexpected feed shape: {0}")]
    FeedShape(String),
}

/// Import every event in `feed` into `store`
///
/// Fails only when the document has no `ciqEvents.event` array.
pub fn commit(
    store: &Store,
    feed: &Value,
    reporter: &dyn ImportReporter,
) -> Result<ImportReport, ImportError> {
    let events = feed_events(feed).ok_or_else(|| {
        ImportError::FeedShape("expected an array at ciqEvents.event".to_string())
    })?;

    let mut report = ImportReport::default();

    for (index, raw) in events.iter().enumerate() {
        let event = match TherapyEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                reporter.malformed_record(index, &e);
                continue;
            }
        };

        let Some(timestamp) = parse_event_time(&event.event_date_time) else {
            reporter.malformed_timestamp(&event.event_date_time);
            continue;
        };

        match event.payload {
            EventPayload::Cgm { egv } => {
                let record = GlucoseReading::new(timestamp, egv);
                persist(store, &event.kind, &record, &mut report, reporter);
            }
            EventPayload::Bolus { insulin, extended } => {
                let Some(amount) = Units::from_f64(insulin) else {
                    reporter.malformed_record(
                        index,
                        &format!("insulin amount out of range: {}", insulin),
                    );
                    continue;
                };
                let record = InsulinDelivery::new(timestamp, amount);
                if extended {
                    reporter.extended_bolus_dropped(&record);
                }
                persist(store, &event.kind, &record, &mut report, reporter);
            }
            EventPayload::Other => report.discard(&event.kind),
        }
    }

    reporter.summary(&report);
    Ok(report)
}

fn persist<T: SeriesRecord>(
    store: &Store,
    kind: &str,
    record: &T,
    report: &mut ImportReport,
    reporter: &dyn ImportReporter,
) {
    reporter.adding(kind, record);

    match store.try_insert(record) {
        Ok(InsertOutcome::Inserted(_)) => report.accept(kind),
        Ok(InsertOutcome::Conflict) => {
            report.discard(kind);
            match store.get_at::<T>(record.timestamp()) {
                Ok(Some(existing)) if existing.record == *record => {
                    reporter.duplicate(kind, record);
                }
                Ok(Some(existing)) => reporter.collision(kind, &existing.record, record),
                Ok(None) => {
                    // Row vanished between the insert and the lookup
                    reporter.collision(kind, &"<deleted>", record);
                }
                Err(e) => reporter.persistence_failure(kind, record, &e),
            }
        }
        Err(e) => reporter.persistence_failure(kind, record, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;
    use std::cell::RefCell;
    use std::fmt::Display;

    #[derive(Default)]
    struct Recorder {
        duplicates: RefCell<usize>,
        collisions: RefCell<Vec<(String, String)>>,
        malformed_times: RefCell<Vec<String>>,
        malformed_records: RefCell<usize>,
        extended: RefCell<usize>,
        failures: RefCell<usize>,
    }

    impl ImportReporter for Recorder {
        fn malformed_record(&self, _index: usize, _error: &str) {
            *self.malformed_records.borrow_mut() += 1;
        }
        fn malformed_timestamp(&self, raw: &str) {
            self.malformed_times.borrow_mut().push(raw.to_string());
        }
        fn extended_bolus_dropped(&self, _record: &dyn Display) {
            *self.extended.borrow_mut() += 1;
        }
        fn duplicate(&self, _kind: &str, _record: &dyn Display) {
            *self.duplicates.borrow_mut() += 1;
        }
        fn collision(&self, _kind: &str, existing: &dyn Display, rejected: &dyn Display) {
            self.collisions
                .borrow_mut()
                .push((existing.to_string(), rejected.to_string()));
        }
        fn persistence_failure(&self, _kind: &str, _record: &dyn Display, _error: &StorageError) {
            *self.failures.borrow_mut() += 1;
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_commit_classifies_events() {
        let store = Store::open_in_memory().unwrap();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "CGM", "eventDateTime": "2024-01-08T07:00:00", "egv": {"estimatedGlucoseValue": 110}},
            {"type": "CGM", "eventDateTime": "2024-01-08T07:05:00.250", "egv": 115},
            {"type": "Bolus", "eventDateTime": "2024-01-08T07:02:00", "insulin": 3.5},
            {"type": "Basal", "eventDateTime": "2024-01-08T07:03:00"},
            {"type": "Alarm", "eventDateTime": "2024-01-08T07:04:00"}
        ]}});

        let report = commit(&store, &feed, &NullReporter).unwrap();
        assert_eq!(report.accepted("CGM"), 2);
        assert_eq!(report.accepted("Bolus"), 1);
        assert_eq!(report.discarded("Basal"), 1);
        assert_eq!(report.discarded("Alarm"), 1);
        assert_eq!(report.total_discarded(), 2);

        let reading = store.get_at::<GlucoseReading>(at(7, 5, 0)).unwrap().unwrap();
        assert_eq!(reading.record.value, 115);
    }

    #[test]
    fn test_malformed_timestamp_counted_nowhere() {
        let store = Store::open_in_memory().unwrap();
        let recorder = Recorder::default();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "CGM", "eventDateTime": "2024-01-08 07:00:00", "egv": 110},
            {"type": "Basal", "eventDateTime": "08/01/2024"}
        ]}});

        let report = commit(&store, &feed, &recorder).unwrap();
        assert_eq!(report, ImportReport::default());
        assert_eq!(
            *recorder.malformed_times.borrow(),
            vec!["2024-01-08 07:00:00".to_string(), "08/01/2024".to_string()]
        );
        assert_eq!(store.count::<GlucoseReading>().unwrap(), 0);
    }

    #[test]
    fn test_malformed_record_skipped() {
        let store = Store::open_in_memory().unwrap();
        let recorder = Recorder::default();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "CGM", "eventDateTime": "2024-01-08T07:00:00"},
            {"eventDateTime": "2024-01-08T07:00:00"},
            {"type": "Bolus", "eventDateTime": "2024-01-08T07:00:00", "insulin": 5000},
            {"type": "CGM", "eventDateTime": "2024-01-08T07:05:00", "egv": 120}
        ]}});

        let report = commit(&store, &feed, &recorder).unwrap();
        assert_eq!(report.accepted("CGM"), 1);
        assert_eq!(report.total_discarded(), 0);
        assert_eq!(*recorder.malformed_records.borrow(), 3);
    }

    #[test]
    fn test_extended_bolus_keeps_point_amount() {
        let store = Store::open_in_memory().unwrap();
        let recorder = Recorder::default();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "Bolus", "eventDateTime": "2024-01-08T12:00:00", "insulin": "6.40", "extendedBolus": true}
        ]}});

        let report = commit(&store, &feed, &recorder).unwrap();
        assert_eq!(report.accepted("Bolus"), 1);
        assert_eq!(*recorder.extended.borrow(), 1);

        let row = store.get_at::<InsulinDelivery>(at(12, 0, 0)).unwrap().unwrap();
        assert_eq!(row.record.amount.hundredths(), 640);
        assert!(row.record.duration.is_zero());
    }

    #[test]
    fn test_collision_with_different_payload() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&GlucoseReading::new(at(7, 0, 0), 100)).unwrap();

        let recorder = Recorder::default();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "CGM", "eventDateTime": "2024-01-08T07:00:00", "egv": 100},
            {"type": "CGM", "eventDateTime": "2024-01-08T07:00:00.9", "egv": 180}
        ]}});

        let report = commit(&store, &feed, &recorder).unwrap();
        assert_eq!(report.accepted("CGM"), 0);
        assert_eq!(report.discarded("CGM"), 2);
        assert_eq!(*recorder.duplicates.borrow(), 1);

        let collisions = recorder.collisions.borrow();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].0, "2024-01-08 07:00:00: 100 mg/dL");
        assert_eq!(collisions[0].1, "2024-01-08 07:00:00: 180 mg/dL");

        // Existing row wins
        let row = store.get_at::<GlucoseReading>(at(7, 0, 0)).unwrap().unwrap();
        assert_eq!(row.record.value, 100);
    }

    #[test]
    fn test_bolus_duplicate_compares_amount() {
        let store = Store::open_in_memory().unwrap();
        let recorder = Recorder::default();
        let feed = json!({"ciqEvents": {"event": [
            {"type": "Bolus", "eventDateTime": "2024-01-08T07:00:00", "insulin": 2.0},
            {"type": "Bolus", "eventDateTime": "2024-01-08T07:00:00", "insulin": "2.00"},
            {"type": "Bolus", "eventDateTime": "2024-01-08T07:00:00", "insulin": 2.05}
        ]}});

        let report = commit(&store, &feed, &recorder).unwrap();
        assert_eq!(report.accepted("Bolus"), 1);
        assert_eq!(report.discarded("Bolus"), 2);
        assert_eq!(*recorder.duplicates.borrow(), 1);
        assert_eq!(recorder.collisions.borrow().len(), 1);
        assert_eq!(*recorder.failures.borrow(), 0);
    }

    #[test]
    fn test_feed_shape_error() {
        let store = Store::open_in_memory().unwrap();
        let err = commit(&store, &json!({"ciqSummary": {}}), &NullReporter).unwrap_err();
        assert!(matches!(err, ImportError::FeedShape(_)));
    }

    #[test]
    fn test_empty_feed() {
        let store = Store::open_in_memory().unwrap();
        let report = commit(&store, &json!({"ciqEvents": {"event": []}}), &NullReporter).unwrap();
        assert_eq!(report, ImportReport::default());
    }
}
