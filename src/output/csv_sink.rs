//! CSV result file, one per website
//!
//! Columns are `url,verdict,method,timestamp`. The writer is flushed after
//! every record so a stopped run leaves a usable partial file.

use crate::model::{UrlCheckRecord, Verdict, WebsiteTarget};
use crate::output::traits::{ResultSink, SinkError, SinkResult};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const HEADER: [&str; 4] = ["url", "verdict", "method", "timestamp"];

struct CsvState {
    writer: csv::Writer<File>,
    seen: HashSet<(usize, String)>,
}

/// Writes `{results_dir}/{safe_name}_indexation_results.csv`
pub struct CsvSink {
    path: PathBuf,
    state: Mutex<CsvState>,
}

impl CsvSink {
    /// Creates (or truncates) the result file for a website and writes the header
    pub fn create(results_dir: &Path, target: &WebsiteTarget) -> SinkResult<Self> {
        std::fs::create_dir_all(results_dir)?;
        let path = results_dir.join(Self::file_name(target));

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;

        tracing::debug!("Writing results for {} to {}", target.name, path.display());

        Ok(Self {
            path,
            state: Mutex::new(CsvState {
                writer,
                seen: HashSet::new(),
            }),
        })
    }

    pub fn file_name(target: &WebsiteTarget) -> String {
        format!("{}_indexation_results.csv", target.safe_name())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?;

        let (position, url) = record.key();
        if !state.seen.insert((position, url.to_string())) {
            return Ok(());
        }

        let timestamp = record.checked_at.format("%Y-%m-%d %H:%M:%S").to_string();
        state.writer.write_record([
            record.url.as_str(),
            record.verdict.unwrap_or(Verdict::Unknown).as_str(),
            record.tier.map(|t| t.as_str()).unwrap_or(""),
            timestamp.as_str(),
        ])?;
        state.writer.flush()?;
        Ok(())
    }
}
