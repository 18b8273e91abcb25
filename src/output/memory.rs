use crate::model::{RunResult, UrlCheckRecord};
use crate::output::traits::{ResultSink, SinkError, SinkResult};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct Collected {
    records: Vec<UrlCheckRecord>,
    seen: HashSet<(usize, String)>,
    result: Option<RunResult>,
}

/// Collects delivered records in memory, one entry per record key
#[derive(Default)]
pub struct MemorySink {
    inner: Mutex<Collected>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered records in delivery order
    pub fn records(&self) -> Vec<UrlCheckRecord> {
        self.inner
            .lock()
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The result passed to `finish`, if the run has ended
    pub fn result(&self) -> Option<RunResult> {
        self.inner.lock().ok().and_then(|c| c.result.clone())
    }
}

impl ResultSink for MemorySink {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?;

        let (position, url) = record.key();
        if inner.seen.insert((position, url.to_string())) {
            inner.records.push(record.clone());
        }
        Ok(())
    }

    fn finish(&self, result: &RunResult) -> SinkResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?;
        inner.result = Some(result.clone());
        Ok(())
    }
}
