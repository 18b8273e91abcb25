//! The per-run resolution loop
//!
//! One run walks the target's URLs in order on a single task. The active
//! tier's source resolves chunks of pending URLs; every terminal record is
//! handed to the sink as soon as it exists. A wholesale tier failure keeps the
//! records that already resolved, returns the rest to `Pending` and moves to
//! the next tier chosen by [`SourceSelector`].

use super::rate_limiter::RateLimiter;
use super::selector::SourceSelector;
use crate::config::{Config, RateLimitConfig};
use crate::model::{Outcome, RunResult, RunStatus, Tier, UrlCheckRecord, WebsiteTarget};
use crate::output::ResultSink;
use crate::sources::{ResolveContext, SourceError, SourceSet};
use crate::state::{RunState, UrlState};
use crate::CheckerError;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Progress is logged after this many terminal records
const PROGRESS_EVERY: usize = 10;

/// Knobs of the resolution loop
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Consecutive transient failures that count as a wholesale tier failure
    pub max_consecutive_transient_failures: u32,
    pub rate_limit: RateLimitConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_consecutive_transient_failures: config.engine.max_consecutive_transient_failures,
            rate_limit: config.rate_limit.clone(),
        }
    }
}

/// How the loop ended
struct Finish {
    status: RunStatus,
    error: Option<String>,
}

impl Finish {
    fn with(status: RunStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }
}

/// Records of one run plus the sink they are delivered to
struct Run<'a> {
    website: &'a str,
    records: Vec<UrlCheckRecord>,
    sink: &'a dyn ResultSink,
    delivered: usize,
}

impl<'a> Run<'a> {
    fn new(target: &'a WebsiteTarget, sink: &'a dyn ResultSink) -> Self {
        let records = target
            .urls_to_check()
            .into_iter()
            .enumerate()
            .map(|(position, url)| UrlCheckRecord::new(position, url))
            .collect();

        Self {
            website: &target.name,
            records,
            sink,
            delivered: 0,
        }
    }

    /// Indices of pending records, in input order
    fn pending(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state == UrlState::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    fn begin(&mut self, chunk: &[usize]) -> Result<Vec<String>, CheckerError> {
        let mut urls = Vec::with_capacity(chunk.len());
        for &i in chunk {
            self.records[i].begin()?;
            urls.push(self.records[i].url.clone());
        }
        Ok(urls)
    }

    fn release(&mut self, chunk: &[usize]) -> Result<(), CheckerError> {
        for &i in chunk {
            self.records[i].release()?;
        }
        Ok(())
    }

    /// Completes every URL of the chunk; a URL the source skipped becomes `unknown`
    fn complete(
        &mut self,
        chunk: &[usize],
        outcomes: &[Outcome],
        tier: Tier,
    ) -> Result<(), CheckerError> {
        for (k, &i) in chunk.iter().enumerate() {
            let outcome = find_outcome(outcomes, k, &self.records[i].url)
                .cloned()
                .unwrap_or_else(|| {
                    Outcome::unknown(self.records[i].url.as_str(), "no verdict returned")
                });
            self.records[i].complete(&outcome, tier)?;
            self.deliver(i);
        }
        Ok(())
    }

    /// Keeps the outcomes a failing tier produced and releases the rest
    fn complete_partial(
        &mut self,
        chunk: &[usize],
        resolved: &[Outcome],
        tier: Tier,
    ) -> Result<(), CheckerError> {
        for &i in chunk {
            match resolved.iter().find(|o| o.url == self.records[i].url).cloned() {
                Some(outcome) => {
                    self.records[i].complete(&outcome, tier)?;
                    self.deliver(i);
                }
                None => self.records[i].release()?,
            }
        }
        Ok(())
    }

    fn fail(&mut self, chunk: &[usize], tier: Tier, reason: &str) -> Result<(), CheckerError> {
        for &i in chunk {
            self.records[i].fail(Some(tier), reason)?;
            self.deliver(i);
        }
        Ok(())
    }

    fn fail_remaining(&mut self, tier: Tier, reason: &str) -> Result<(), CheckerError> {
        let pending = self.pending();
        self.fail(&pending, tier, reason)
    }

    fn deliver(&mut self, i: usize) {
        let record = &self.records[i];
        if let Err(e) = self.sink.deliver(record) {
            tracing::warn!("Failed to deliver result for {}: {}", record.url, e);
        }

        self.delivered += 1;
        if self.delivered % PROGRESS_EVERY == 0 {
            tracing::info!(
                "Progress for {}: {}/{} URLs checked",
                self.website,
                self.delivered,
                self.records.len()
            );
        }
    }

    /// Splits into terminal records (input order) and the not-attempted count
    fn into_terminal(self) -> (Vec<UrlCheckRecord>, usize) {
        let total = self.records.len();
        let terminal: Vec<UrlCheckRecord> = self
            .records
            .into_iter()
            .filter(|r| r.is_terminal())
            .collect();
        let not_attempted = total - terminal.len();
        (terminal, not_attempted)
    }
}

/// Sources return outcomes in input order; fall back to a search by URL
fn find_outcome<'o>(outcomes: &'o [Outcome], index: usize, url: &str) -> Option<&'o Outcome> {
    outcomes
        .get(index)
        .filter(|o| o.url == url)
        .or_else(|| outcomes.iter().find(|o| o.url == url))
}

/// Delay before re-issuing a chunk after the n-th consecutive transient failure
///
/// Starts at the rate-limit baseline and doubles per failure, capped at the ceiling.
fn transient_backoff(config: &RateLimitConfig, failures: u32) -> Duration {
    let factor = 1u64 << failures.saturating_sub(1).min(16);
    Duration::from_millis(
        config
            .baseline_ms
            .saturating_mul(factor)
            .min(config.ceiling_ms),
    )
}

fn advance(state: &mut RunState, to: RunState) -> Result<(), CheckerError> {
    if !state.can_transition_to(to) {
        return Err(CheckerError::InvalidRunTransition { from: *state, to });
    }
    *state = to;
    Ok(())
}

/// Drives runs to completion
#[derive(Debug, Clone, Default)]
pub struct ResolutionEngine {
    settings: EngineSettings,
}

impl ResolutionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one website to a terminal status
    ///
    /// Never returns an error: tier failures, throttling and per-URL errors
    /// all end up in the returned [`RunResult`]. An invalid target yields a
    /// `Failed` result without any network call.
    pub async fn run(
        &self,
        target: &WebsiteTarget,
        sources: &SourceSet,
        sink: &dyn ResultSink,
        cancel: &CancellationToken,
    ) -> RunResult {
        let started_at = Utc::now();
        let selector = SourceSelector::new(target, sources);

        let initial = match selector.select() {
            Ok(tier) => tier,
            Err(e) => {
                tracing::error!("Not starting run: {}", e);
                let result = RunResult::failed(&target.name, e.to_string());
                finish_sink(sink, &result);
                return result;
            }
        };

        let mut run = Run::new(target, sink);
        let mut tiers_attempted = vec![initial];

        let finish = match self
            .drive(&mut run, &selector, sources, &mut tiers_attempted, cancel)
            .await
        {
            Ok(finish) => finish,
            Err(e) => {
                tracing::error!("Run for {} aborted: {}", target.name, e);
                Finish {
                    status: RunStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        };

        let (records, not_attempted) = run.into_terminal();
        let mut result = RunResult::new(
            &target.name,
            records,
            finish.status,
            tiers_attempted,
            started_at,
        );
        result.not_attempted = not_attempted;
        result.error = finish.error;

        tracing::info!(
            "Run for {} {}: {} checked ({} indexed, {} not indexed, {} unknown), {} not attempted, tier {}",
            result.website,
            result.status,
            result.checked,
            result.indexed,
            result.not_indexed,
            result.errored,
            result.not_attempted,
            result.tier.map(|t| t.as_str()).unwrap_or("none")
        );

        finish_sink(sink, &result);
        result
    }

    async fn drive(
        &self,
        run: &mut Run<'_>,
        selector: &SourceSelector,
        sources: &SourceSet,
        tiers_attempted: &mut Vec<Tier>,
        cancel: &CancellationToken,
    ) -> Result<Finish, CheckerError> {
        let mut state = RunState::Idle;
        advance(&mut state, RunState::Running)?;

        let max_transient = self.settings.max_consecutive_transient_failures.max(1);
        let mut tier = *tiers_attempted.last().unwrap_or(&Tier::Scrape);
        let mut limiter = RateLimiter::new(&self.settings.rate_limit);
        let mut transient_failures = 0u32;

        tracing::info!(
            "Checking {} URLs for {} using the {} tier",
            run.records.len(),
            run.website,
            tier
        );

        let finish = loop {
            let pending = run.pending();
            if pending.is_empty() {
                break Finish::with(RunStatus::Completed);
            }

            if cancel.is_cancelled() {
                tracing::info!(
                    "Stop requested for {}, {} URLs not attempted",
                    run.website,
                    pending.len()
                );
                break Finish::with(RunStatus::Stopped);
            }

            let failure = match sources.get(tier) {
                None => Some(format!("no {} source configured", tier)),
                Some(source) => {
                    let size = source
                        .batch_size()
                        .unwrap_or(pending.len())
                        .clamp(1, pending.len());
                    let chunk = &pending[..size];
                    let urls = run.begin(chunk)?;

                    let mut ctx = ResolveContext {
                        cancel,
                        limiter: &mut limiter,
                    };

                    match source.resolve(&urls, &mut ctx).await {
                        Ok(outcomes) => {
                            transient_failures = 0;
                            run.complete(chunk, &outcomes, tier)?;
                            None
                        }
                        Err(SourceError::Cancelled) => {
                            run.release(chunk)?;
                            continue;
                        }
                        Err(SourceError::Transient { reason }) => {
                            transient_failures += 1;
                            if transient_failures >= max_transient {
                                run.release(chunk)?;
                                Some(format!(
                                    "{} consecutive transient failures, last: {}",
                                    transient_failures, reason
                                ))
                            } else if tier == Tier::Console {
                                let backoff =
                                    transient_backoff(&self.settings.rate_limit, transient_failures);
                                tracing::warn!(
                                    "{} tier: {} ({}/{}), retrying in {:?}",
                                    tier,
                                    reason,
                                    transient_failures,
                                    max_transient,
                                    backoff
                                );
                                run.release(chunk)?;
                                tokio::select! {
                                    _ = cancel.cancelled() => {}
                                    _ = tokio::time::sleep(backoff) => {}
                                }
                                None
                            } else {
                                tracing::warn!(
                                    "{} tier: {} ({}/{}), recording {} URLs as unknown",
                                    tier,
                                    reason,
                                    transient_failures,
                                    max_transient,
                                    chunk.len()
                                );
                                run.fail(chunk, tier, &reason)?;
                                None
                            }
                        }
                        Err(SourceError::TierUnavailable { reason, resolved }) => {
                            run.complete_partial(chunk, &resolved, tier)?;
                            Some(reason)
                        }
                    }
                }
            };

            let Some(reason) = failure else {
                continue;
            };
            transient_failures = 0;

            match selector.next_after(tier) {
                Some(next) => {
                    tracing::warn!(
                        "{} tier unavailable for {} ({}), downgrading to {}",
                        tier,
                        run.website,
                        reason,
                        next
                    );
                    tier = next;
                    tiers_attempted.push(next);
                    limiter = RateLimiter::new(&self.settings.rate_limit);
                }
                None if selector.is_override() => {
                    tracing::error!(
                        "{} tier unavailable for {} and the method is pinned: {}",
                        tier,
                        run.website,
                        reason
                    );
                    run.fail_remaining(tier, &reason)?;
                    break Finish {
                        status: RunStatus::Failed,
                        error: Some(reason),
                    };
                }
                None => {
                    // Nothing ranks below the last-resort tier
                    tracing::error!(
                        "{} tier unavailable for {} with no fallback: {}",
                        tier,
                        run.website,
                        reason
                    );
                    run.fail_remaining(tier, &reason)?;
                    break Finish {
                        status: RunStatus::Completed,
                        error: Some(reason),
                    };
                }
            }
        };

        advance(&mut state, RunState::from(finish.status))?;
        Ok(finish)
    }
}

fn finish_sink(sink: &dyn ResultSink, result: &RunResult) {
    if let Err(e) = sink.finish(result) {
        tracing::warn!("Failed to finalize results for {}: {}", result.website, e);
    }
}
