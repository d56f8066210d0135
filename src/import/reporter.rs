//! Import reporting
//!
//! [`ImportReport`] is the structured result of a run. [`ImportReporter`] is
//! the side channel for per-record events; [`TracingReporter`] writes them to
//! the `tracing` log.

use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Accepted and discarded record counts per feed event kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub accepted: BTreeMap<String, usize>,
    pub discarded: BTreeMap<String, usize>,
}

impl ImportReport {
    pub fn accept(&mut self, kind: &str) {
        *self.accepted.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn discard(&mut self, kind: &str) {
        *self.discarded.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn accepted(&self, kind: &str) -> usize {
        self.accepted.get(kind).copied().unwrap_or(0)
    }

    pub fn discarded(&self, kind: &str) -> usize {
        self.discarded.get(kind).copied().unwrap_or(0)
    }

    pub fn total_accepted(&self) -> usize {
        self.accepted.values().sum()
    }

    pub fn total_discarded(&self) -> usize {
        self.discarded.values().sum()
    }
}

/// Receives per-record events during an import.
///
/// Every method defaults to doing nothing.
pub trait ImportReporter {
    /// A record is about to be persisted
    fn adding(&self, _kind: &str, _record: &dyn Display) {}

    /// A raw feed element could not be normalized
    fn malformed_record(&self, _index: usize, _error: &str) {}

    /// `eventDateTime` did not have the expected shape
    fn malformed_timestamp(&self, _raw: &str) {}

    /// Extended-bolus duration was present and dropped
    fn extended_bolus_dropped(&self, _record: &dyn Display) {}

    /// Timestamp collision with an identical existing record
    fn duplicate(&self, _kind: &str, _record: &dyn Display) {}

    /// Timestamp collision with a record whose payload differs
    fn collision(&self, _kind: &str, _existing: &dyn Display, _rejected: &dyn Display) {}

    /// Persistence failed for a reason other than a collision
    fn persistence_failure(&self, _kind: &str, _record: &dyn Display, _error: &StorageError) {}

    /// The run finished
    fn summary(&self, _report: &ImportReport) {}
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ImportReporter for NullReporter {}

/// Reporter that logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ImportReporter for TracingReporter {
    fn adding(&self, kind: &str, record: &dyn Display) {
        tracing::debug!(kind, "Adding {} record: {}", kind, record);
    }

    fn malformed_record(&self, index: usize, error: &str) {
        tracing::error!(index, "Ignoring malformed feed event: {}", error);
    }

    fn malformed_timestamp(&self, raw: &str) {
        tracing::error!("Ignoring unexpected time format: {}", raw);
    }

    fn extended_bolus_dropped(&self, record: &dyn Display) {
        tracing::warn!("Discarding extended bolus duration data for {}", record);
    }

    fn duplicate(&self, kind: &str, record: &dyn Display) {
        tracing::info!(kind, "Ignoring duplicate entry: {}", record);
    }

    fn collision(&self, kind: &str, existing: &dyn Display, rejected: &dyn Display) {
        tracing::warn!(
            kind,
            "Ignoring collision: exists {}; rejecting {}",
            existing,
            rejected
        );
    }

    fn persistence_failure(&self, kind: &str, record: &dyn Display, error: &StorageError) {
        tracing::error!(kind, error = %error, "Failed to store {}", record);
    }

    fn summary(&self, report: &ImportReport) {
        for (kind, count) in &report.accepted {
            tracing::info!("Parsed {} records of type {}", count, kind);
        }
        for (kind, count) in &report.discarded {
            tracing::warn!("Discarded {} records of type {}", count, kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = ImportReport::default();
        report.accept("CGM");
        report.accept("CGM");
        report.discard("Basal");
        report.discard("CGM");

        assert_eq!(report.accepted("CGM"), 2);
        assert_eq!(report.accepted("Bolus"), 0);
        assert_eq!(report.discarded("Basal"), 1);
        assert_eq!(report.total_accepted(), 2);
        assert_eq!(report.total_discarded(), 2);
    }

    #[test]
    fn test_report_serializes_as_maps() {
        let mut report = ImportReport::default();
        report.accept("Bolus");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["accepted"]["Bolus"], 1);
        assert!(json["discarded"].as_object().unwrap().is_empty());
    }
}
