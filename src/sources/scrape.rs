//! Search-result scraping tier
//!
//! Issues one `site:<url>` query per URL and looks for the URL among the
//! result links. Throttling (429/503, the `/sorry/` interstitial, CAPTCHA
//! pages, timeouts) is absorbed here under the run's [`RateLimiter`] policy;
//! it never fails the tier.
//!
//! [`RateLimiter`]: crate::engine::RateLimiter

use super::http::random_user_agent;
use super::{ResolveContext, Source, SourceError};
use crate::config::ScrapeConfig;
use crate::engine::ThrottleDecision;
use crate::model::{Outcome, Tier};
use crate::url::same_page;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Instant;
use url::Url;

/// Body markers of a CAPTCHA or bot-check page
const CAPTCHA_MARKERS: &[&str] = &["unusual traffic", "g-recaptcha", "captcha-form"];

/// Outcome of a single search request
#[derive(Debug)]
enum SearchResponse {
    /// A result page to inspect
    Page(String),
    /// The engine asked us to slow down
    Throttled(String),
    /// Any other failure; consumes an attempt
    Failed(String),
}

/// Extracts the target URLs of all result anchors on a search page
///
/// Handles both direct links and the engine's `/url?q=` redirect wrapper.
pub fn parse_result_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchor_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(extract_target)
        .collect()
}

fn extract_target(href: &str) -> Option<String> {
    let href = href.trim();

    if href.starts_with("/url?") {
        let wrapped = Url::parse(&format!("https://www.google.com{}", href)).ok()?;
        return wrapped
            .query_pairs()
            .find(|(key, _)| key == "q" || key == "url")
            .map(|(_, value)| value.into_owned());
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    None
}

fn looks_like_captcha(body: &str) -> bool {
    let lower = body.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Search-result scraping tier (rank 3, always available)
pub struct ScrapeSource {
    client: Client,
    search_url: String,
    max_attempts: u32,
}

impl ScrapeSource {
    pub fn new(client: Client, config: &ScrapeConfig) -> Self {
        Self {
            client,
            search_url: config.search_url.clone(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    async fn search(&self, url: &str) -> SearchResponse {
        let query = format!("site:{}", url);
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", query.as_str()), ("hl", "en")])
            .header(reqwest::header::USER_AGENT, random_user_agent())
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return SearchResponse::Throttled("search request timed out".to_string())
            }
            Err(e) => return SearchResponse::Failed(format!("search request failed: {}", e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return SearchResponse::Throttled(format!("HTTP {}", status.as_u16()));
        }
        if response.url().path().starts_with("/sorry/") {
            return SearchResponse::Throttled("redirected to bot check".to_string());
        }
        if !status.is_success() {
            return SearchResponse::Failed(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) if looks_like_captcha(&body) => {
                SearchResponse::Throttled("CAPTCHA page served".to_string())
            }
            Ok(body) => SearchResponse::Page(body),
            Err(e) => SearchResponse::Failed(format!("failed to read search page: {}", e)),
        }
    }

    /// Resolves one URL, retrying under the limiter's policy
    async fn resolve_one(
        &self,
        url: &str,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Outcome, SourceError> {
        ctx.limiter.begin_item();
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            let wait = ctx.limiter.before_request(Instant::now());
            if !wait.is_zero() {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return Err(SourceError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            match self.search(url).await {
                SearchResponse::Page(html) => {
                    ctx.limiter.on_success();
                    let indexed = parse_result_links(&html)
                        .iter()
                        .any(|link| same_page(link, url));
                    tracing::trace!("{} -> indexed={}", url, indexed);
                    return Ok(Outcome::from_indexed(url, indexed));
                }
                SearchResponse::Throttled(reason) => {
                    tracing::warn!("Throttled while checking {} ({})", url, reason);
                    match ctx.limiter.on_throttled() {
                        ThrottleDecision::Retry(delay) => {
                            tracing::debug!("Backing off to {:?} before retrying", delay);
                            last_error = reason;
                        }
                        ThrottleDecision::GiveUp => {
                            return Ok(Outcome::unknown(
                                url,
                                format!(
                                    "throttled {} times in a row: {}",
                                    ctx.limiter.consecutive_throttles(),
                                    reason
                                ),
                            ));
                        }
                    }
                }
                SearchResponse::Failed(reason) => {
                    tracing::debug!("Attempt {} for {} failed: {}", attempt, url, reason);
                    last_error = reason;
                }
            }
        }

        Ok(Outcome::unknown(
            url,
            format!("gave up after {} attempts: {}", self.max_attempts, last_error),
        ))
    }
}

#[async_trait]
impl Source for ScrapeSource {
    fn tier(&self) -> Tier {
        Tier::Scrape
    }

    fn batch_size(&self) -> Option<usize> {
        Some(1)
    }

    async fn resolve(
        &self,
        urls: &[String],
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Vec<Outcome>, SourceError> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            if ctx.cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            outcomes.push(self.resolve_one(url, ctx).await?);
        }
        Ok(outcomes)
    }
}
