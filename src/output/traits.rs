//! Result sink traits and error types
//!
//! This module defines the trait interface result sinks implement and the
//! errors they report back to the engine.

use crate::model::{RunResult, UrlCheckRecord};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while delivering results
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sink lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Receives terminal records as a run produces them
///
/// Deliveries are append-only. The same record (same position and URL) may
/// be delivered more than once; implementations must keep a single logical
/// entry for it. Sink failures are logged by the engine and never abort a run.
pub trait ResultSink: Send + Sync {
    /// Accepts one terminal record
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()>;

    /// Called once with the final result of the run
    fn finish(&self, result: &RunResult) -> SinkResult<()> {
        let _ = result;
        Ok(())
    }
}
