//! Storage error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the event store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite reported an error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A series already holds an event at this timestamp
    #[error("Duplicate timestamp in {series}: {timestamp}")]
    DuplicateTimestamp { series: &'static str, timestamp: String },

    /// A dish with this description already exists
    #[error("Duplicate dish: {0}")]
    DuplicateDish(String),

    /// Row is still referenced and may not be deleted
    #[error("Protected: {0}")]
    Protected(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Value rejected before reaching the database
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StorageError {
    /// True for timestamp collisions in an event series
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::DuplicateTimestamp { .. })
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
