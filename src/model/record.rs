use crate::state::UrlState;
use crate::CheckerError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One of the three priority-ordered data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Search Console dataset (rank 1)
    Console,
    /// Paid bulk-check API (rank 2)
    BulkApi,
    /// Search-result scraping (rank 3, last resort)
    Scrape,
}

impl Tier {
    /// All tiers in priority order
    pub const ALL: [Tier; 3] = [Tier::Console, Tier::BulkApi, Tier::Scrape];

    /// Priority rank, 1 being the most preferred
    pub fn rank(&self) -> u8 {
        match self {
            Self::Console => 1,
            Self::BulkApi => 2,
            Self::Scrape => 3,
        }
    }

    /// The next lower-priority tier, if any
    pub fn next(&self) -> Option<Tier> {
        match self {
            Self::Console => Some(Self::BulkApi),
            Self::BulkApi => Some(Self::Scrape),
            Self::Scrape => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::BulkApi => "bulk_api",
            Self::Scrape => "scrape",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "console" => Some(Self::Console),
            "bulk_api" => Some(Self::BulkApi),
            "scrape" => Some(Self::Scrape),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-URL classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Indexed,
    NotIndexed,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::NotIndexed => "not_indexed",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "indexed" => Some(Self::Indexed),
            "not_indexed" => Some(Self::NotIndexed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// True for `Indexed` and `NotIndexed`
    pub fn is_definite(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a source reports for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub url: String,
    pub verdict: Verdict,
    pub error: Option<String>,
}

impl Outcome {
    pub fn indexed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verdict: Verdict::Indexed,
            error: None,
        }
    }

    pub fn not_indexed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verdict: Verdict::NotIndexed,
            error: None,
        }
    }

    pub fn unknown(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            verdict: Verdict::Unknown,
            error: Some(error.into()),
        }
    }

    pub fn from_indexed(url: impl Into<String>, indexed: bool) -> Self {
        if indexed {
            Self::indexed(url)
        } else {
            Self::not_indexed(url)
        }
    }
}

/// The engine's record of one URL within one run
///
/// The verdict is written exactly once; afterwards the record is terminal
/// and any further transition is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlCheckRecord {
    /// Position of the URL in the target's URL list
    pub position: usize,
    pub url: String,
    pub state: UrlState,
    pub verdict: Option<Verdict>,
    pub tier: Option<Tier>,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl UrlCheckRecord {
    /// Creates a pending record
    pub fn new(position: usize, url: impl Into<String>) -> Self {
        Self {
            position,
            url: url.into(),
            state: UrlState::Pending,
            verdict: None,
            tier: None,
            checked_at: Utc::now(),
            error: None,
        }
    }

    /// Identity used by sinks to deduplicate redelivered records
    pub fn key(&self) -> (usize, &str) {
        (self.position, self.url.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, to: UrlState) -> Result<(), CheckerError> {
        if !self.state.can_transition_to(to) {
            return Err(CheckerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Pending → InFlight
    pub fn begin(&mut self) -> Result<(), CheckerError> {
        self.transition(UrlState::InFlight)
    }

    /// InFlight → Pending, used when a tier fails wholesale or a stop interrupts
    pub fn release(&mut self) -> Result<(), CheckerError> {
        self.transition(UrlState::Pending)
    }

    /// InFlight → Resolved or Errored, depending on the outcome
    pub fn complete(&mut self, outcome: &Outcome, tier: Tier) -> Result<(), CheckerError> {
        let to = if outcome.verdict.is_definite() {
            UrlState::Resolved
        } else {
            UrlState::Errored
        };
        self.transition(to)?;
        self.verdict = Some(outcome.verdict);
        self.tier = Some(tier);
        self.checked_at = Utc::now();
        self.error = match (&outcome.error, outcome.verdict) {
            (Some(e), _) => Some(e.clone()),
            (None, Verdict::Unknown) => Some("no verdict returned".to_string()),
            (None, _) => None,
        };
        Ok(())
    }

    /// Pending/InFlight → Errored with an `unknown` verdict
    pub fn fail(&mut self, tier: Option<Tier>, error: impl Into<String>) -> Result<(), CheckerError> {
        self.transition(UrlState::Errored)?;
        self.verdict = Some(Verdict::Unknown);
        self.tier = tier;
        self.checked_at = Utc::now();
        self.error = Some(error.into());
        Ok(())
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate result of one run over a website
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub website: String,
    /// Terminal records in input order
    pub records: Vec<UrlCheckRecord>,
    /// Tier active when the run ended
    pub tier: Option<Tier>,
    /// Every tier that was active at some point, in activation order
    pub tiers_attempted: Vec<Tier>,
    pub status: RunStatus,
    pub checked: usize,
    pub indexed: usize,
    pub not_indexed: usize,
    pub errored: usize,
    /// URLs never resolved because the run was stopped
    pub not_attempted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Run-level failure detail
    pub error: Option<String>,
}

impl RunResult {
    /// Builds a result from terminal records, computing the counts
    pub fn new(
        website: impl Into<String>,
        records: Vec<UrlCheckRecord>,
        status: RunStatus,
        tiers_attempted: Vec<Tier>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let checked = records.len();
        let indexed = records
            .iter()
            .filter(|r| r.verdict == Some(Verdict::Indexed))
            .count();
        let not_indexed = records
            .iter()
            .filter(|r| r.verdict == Some(Verdict::NotIndexed))
            .count();
        let errored = records
            .iter()
            .filter(|r| r.state == UrlState::Errored)
            .count();

        Self {
            website: website.into(),
            records,
            tier: tiers_attempted.last().copied(),
            tiers_attempted,
            status,
            checked,
            indexed,
            not_indexed,
            errored,
            not_attempted: 0,
            started_at,
            finished_at: Utc::now(),
            error: None,
        }
    }

    /// Result of a run that never started processing URLs
    pub fn failed(website: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(website, Vec::new(), RunStatus::Failed, Vec::new(), Utc::now());
        result.error = Some(error.into());
        result
    }

    /// Indexed share of checked URLs as a percentage
    pub fn indexed_rate(&self) -> f64 {
        if self.checked == 0 {
            return 0.0;
        }
        (self.indexed as f64 / self.checked as f64) * 100.0
    }
}
