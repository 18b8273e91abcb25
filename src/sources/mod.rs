//! Indexation data sources
//!
//! Every tier implements the same [`Source`] capability and differs only in
//! batching and failure semantics:
//!
//! - `ConsoleSource`: one paginated dataset query for the whole remaining list
//! - `BulkApiSource`: fixed-size batches, per-URL verdicts, one retry for stragglers
//! - `ScrapeSource`: one rate-limited search query per URL

mod bulk_api;
mod console;
mod http;
mod scrape;

pub use bulk_api::{BulkApiClient, BulkApiSource};
pub use console::{ConsoleClient, ConsoleSource, SiteEntry};
pub use http::{build_api_client, build_scrape_client, random_user_agent};
pub use scrape::{parse_result_links, ScrapeSource};

use crate::engine::RateLimiter;
use crate::model::{Outcome, Tier};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a source reports to the engine
///
/// None of these reach the caller directly: the engine turns them into
/// downgrades, retries or per-URL `unknown` verdicts.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Wholesale failure; the tier cannot serve the rest of this run
    #[error("tier unavailable: {reason}")]
    TierUnavailable {
        reason: String,
        /// Outcomes completed before the failure, kept by the engine
        resolved: Vec<Outcome>,
    },

    /// Request-level timeout or throttle; a run of these is a wholesale failure
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// The run was stopped while the source was waiting
    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::TierUnavailable {
            reason: reason.into(),
            resolved: Vec::new(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }
}

/// Per-call context handed to a source by the engine
pub struct ResolveContext<'a> {
    pub cancel: &'a CancellationToken,
    /// The limiter of the active tier for this run
    pub limiter: &'a mut RateLimiter,
}

/// One indexation data source
#[async_trait]
pub trait Source: Send + Sync {
    fn tier(&self) -> Tier;

    /// URLs per `resolve` call; `None` means the whole remaining list
    fn batch_size(&self) -> Option<usize>;

    /// Resolves a chunk of URLs
    ///
    /// On success exactly one outcome per input URL is returned, in input
    /// order, each carrying the input URL string unchanged.
    async fn resolve(
        &self,
        urls: &[String],
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Vec<Outcome>, SourceError>;
}

/// The authenticated handles available to one run
///
/// Console and bulk handles are optional (no credentials, no tier); the
/// scraping source is always present as the tier of last resort.
#[derive(Clone)]
pub struct SourceSet {
    pub console: Option<Arc<dyn Source>>,
    pub bulk_api: Option<Arc<dyn Source>>,
    pub scrape: Arc<dyn Source>,
}

impl SourceSet {
    pub fn new(scrape: Arc<dyn Source>) -> Self {
        Self {
            console: None,
            bulk_api: None,
            scrape,
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Source>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn with_bulk_api(mut self, bulk_api: Arc<dyn Source>) -> Self {
        self.bulk_api = Some(bulk_api);
        self
    }

    /// The source serving a tier, if one is configured
    pub fn get(&self, tier: Tier) -> Option<&Arc<dyn Source>> {
        match tier {
            Tier::Console => self.console.as_ref(),
            Tier::BulkApi => self.bulk_api.as_ref(),
            Tier::Scrape => Some(&self.scrape),
        }
    }

    pub fn has(&self, tier: Tier) -> bool {
        self.get(tier).is_some()
    }
}

/// Classifies a transport error the way both API tiers do
///
/// Timeouts are transient; anything else means the endpoint cannot be used.
pub(crate) fn classify_send_error(context: &str, err: &reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::transient(format!("{} timed out", context))
    } else if err.is_connect() {
        SourceError::unavailable(format!("{} unreachable: {}", context, err))
    } else {
        SourceError::unavailable(format!("{} request failed: {}", context, err))
    }
}
