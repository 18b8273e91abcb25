//! SQLite-backed result sink
//!
//! Records each run and each terminal record directly in the storage
//! backend. Redelivered records are ignored by the `(run_id, position)`
//! uniqueness constraint.

use crate::model::{RunResult, UrlCheckRecord};
use crate::output::traits::{ResultSink, SinkError, SinkResult};
use crate::storage::Storage;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared by every run of one process
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// SQLite-based result sink for one run
pub struct SqliteSink {
    storage: SharedStorage,
    run_id: i64,
}

impl SqliteSink {
    /// Creates the run row and returns a sink bound to it
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `website` - Name of the website being checked
    /// * `config_hash` - Hash of the configuration the run uses
    pub fn begin(storage: SharedStorage, website: &str, config_hash: &str) -> SinkResult<Self> {
        let run_id = {
            let mut guard = lock(&storage)?;
            guard.create_run(website, config_hash)?
        };
        tracing::debug!("Recording {} as run {}", website, run_id);
        Ok(Self { storage, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }
}

fn lock(storage: &SharedStorage) -> SinkResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage
        .lock()
        .map_err(|e| SinkError::Poisoned(format!("Failed to lock storage: {}", e)))
}

impl ResultSink for SqliteSink {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        let inserted = lock(&self.storage)?.record_check(self.run_id, record)?;
        if !inserted {
            tracing::trace!("Ignoring redelivered record for {}", record.url);
        }
        Ok(())
    }

    fn finish(&self, result: &RunResult) -> SinkResult<()> {
        lock(&self.storage)?.finish_run(self.run_id, result)?;
        Ok(())
    }
}
