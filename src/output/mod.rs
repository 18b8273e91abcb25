//! Output module for delivering and summarizing results
//!
//! This module handles:
//! - The `ResultSink` interface runs deliver terminal records to
//! - CSV result files, SQLite persistence, log lines, in-memory collection
//! - Fan-out to several sinks
//! - Printing run summaries

mod csv_sink;
mod log_sink;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_sink::CsvSink;
pub use log_sink::LogSink;
pub use memory::MemorySink;
pub use sqlite_output::{SharedStorage, SqliteSink};
pub use stats::{load_latest_runs, print_latest_runs, print_run_summary, BatchTotals};
pub use traits::{ResultSink, SinkError, SinkResult};

use crate::model::{RunResult, UrlCheckRecord};
use std::sync::Arc;

/// Delivers every record to several sinks
///
/// Every sink is attempted even when an earlier one fails; the first error
/// is returned.
#[derive(Default, Clone)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for SinkSet {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finish(&self, result: &RunResult) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.finish(result) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
