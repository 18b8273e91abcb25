//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{RunResult, UrlCheckRecord};
use crate::storage::{CheckRow, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Record is not terminal: {0}")]
    NotTerminal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Callers share one backend between concurrent runs behind a mutex, so
/// every method takes the run id explicitly.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run for a website in the `running` state
    ///
    /// # Arguments
    ///
    /// * `website` - Name of the website being checked
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, website: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run for a website
    fn latest_run(&self, website: &str) -> StorageResult<Option<RunRecord>>;

    /// Gets the most recent run of every website, ordered by website name
    fn latest_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Stores the terminal status, tier, counts and finish time of a run
    fn finish_run(&mut self, run_id: i64, result: &RunResult) -> StorageResult<()>;

    // ===== Check Management =====

    /// Persists a terminal record
    ///
    /// Returns `false` when the record was already stored for this run.
    fn record_check(&mut self, run_id: i64, record: &UrlCheckRecord) -> StorageResult<bool>;

    /// Gets every check of a run in URL order
    fn list_checks(&self, run_id: i64) -> StorageResult<Vec<CheckRow>>;

    /// Counts the checks stored for a run
    fn count_checks(&self, run_id: i64) -> StorageResult<u64>;
}
