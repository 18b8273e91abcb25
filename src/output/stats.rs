//! Run summaries for the terminal
//!
//! This module prints the per-website summary after a batch of runs and the
//! latest persisted run of every website (`--stats`).

use crate::model::RunResult;
use crate::storage::{RunRecord, Storage};
use crate::CheckerError;

/// Aggregate over several run results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTotals {
    pub websites: usize,
    pub checked: usize,
    pub indexed: usize,
    pub not_indexed: usize,
    pub errored: usize,
    pub not_attempted: usize,
}

impl BatchTotals {
    pub fn from_results(results: &[RunResult]) -> Self {
        results.iter().fold(Self::default(), |mut totals, r| {
            totals.websites += 1;
            totals.checked += r.checked;
            totals.indexed += r.indexed;
            totals.not_indexed += r.not_indexed;
            totals.errored += r.errored;
            totals.not_attempted += r.not_attempted;
            totals
        })
    }

    /// Indexed share of checked URLs as a percentage
    pub fn indexed_rate(&self) -> f64 {
        if self.checked == 0 {
            return 0.0;
        }
        (self.indexed as f64 / self.checked as f64) * 100.0
    }
}

/// Prints the result of each run and the overall totals to stdout
pub fn print_run_summary(results: &[RunResult]) {
    println!("=== Indexation Summary ===\n");

    for result in results {
        let method = if result.tiers_attempted.is_empty() {
            "none".to_string()
        } else {
            result
                .tiers_attempted
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        };

        println!("{} [{}]", result.website, result.status);
        println!("  Method: {}", method);
        println!(
            "  Checked: {}  Indexed: {}  Not indexed: {}  Unknown: {}",
            result.checked, result.indexed, result.not_indexed, result.errored
        );
        if result.not_attempted > 0 {
            println!("  Not attempted: {}", result.not_attempted);
        }
        println!("  Indexed rate: {:.1}%", result.indexed_rate());
        if let Some(error) = &result.error {
            println!("  Error: {}", error);
        }
        println!();
    }

    let totals = BatchTotals::from_results(results);
    println!(
        "Total: {} websites, {} URLs checked, {} indexed ({:.1}%), {} not indexed, {} unknown",
        totals.websites,
        totals.checked,
        totals.indexed,
        totals.indexed_rate(),
        totals.not_indexed,
        totals.errored
    );
}

/// Loads the latest persisted run of every website
pub fn load_latest_runs(storage: &dyn Storage) -> Result<Vec<RunRecord>, CheckerError> {
    Ok(storage.latest_runs()?)
}

/// Prints the latest persisted run of every website to stdout
pub fn print_latest_runs(runs: &[RunRecord]) {
    println!("=== Latest Runs ===\n");

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for run in runs {
        let rate = if run.checked > 0 {
            (run.indexed as f64 / run.checked as f64) * 100.0
        } else {
            0.0
        };

        println!("{} (run {})", run.website, run.id);
        println!(
            "  Started: {}  Finished: {}",
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
        println!(
            "  Status: {}  Tier: {}",
            run.status,
            run.tier.map(|t| t.as_str()).unwrap_or("-")
        );
        println!(
            "  Checked: {}  Indexed: {} ({:.1}%)  Not indexed: {}  Unknown: {}",
            run.checked, run.indexed, rate, run.not_indexed, run.errored
        );
        println!();
    }
}
