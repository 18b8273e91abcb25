//! Search Console tier
//!
//! Matches the requested URLs against the page dimension of the property's
//! search performance dataset. The dataset only lists pages that appeared in
//! results, so absence is reported as `not_indexed`.

use super::{classify_send_error, ResolveContext, Source, SourceError};
use crate::config::ConsoleConfig;
use crate::model::{Outcome, Tier, Verdict};
use crate::url::{extract_host, match_key_lossy, property_covers};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const UNVERIFIED: &str = "siteUnverifiedUser";

/// One property visible to the authenticated account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    pub site_url: String,
    #[serde(default)]
    pub permission_level: String,
}

impl SiteEntry {
    pub fn is_accessible(&self) -> bool {
        self.permission_level != UNVERIFIED
    }
}

#[derive(Debug, Deserialize)]
struct SitesResponse {
    #[serde(rename = "siteEntry", default)]
    site_entry: Vec<SiteEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    start_date: String,
    end_date: String,
    dimensions: [&'a str; 1],
    row_limit: u32,
    start_row: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    keys: Vec<String>,
}

/// Authenticated Search Console API handle
///
/// The access token is acquired by the caller; this client never refreshes it.
#[derive(Clone)]
pub struct ConsoleClient {
    http: Client,
    api_base: String,
    access_token: String,
}

impl ConsoleClient {
    pub fn new(http: Client, api_base: &str, access_token: impl Into<String>) -> Self {
        let mut api_base = api_base.trim().to_string();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Self {
            http,
            api_base,
            access_token: access_token.into(),
        }
    }

    /// Lists every property of the account, verified or not
    pub async fn list_sites(&self) -> Result<Vec<SiteEntry>, SourceError> {
        let url = format!("{}sites", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| classify_send_error("Search Console site list", &e))?;

        let response = check_status("Search Console site list", response)?;
        let body: SitesResponse = response.json().await.map_err(|e| {
            SourceError::unavailable(format!("malformed Search Console site list: {}", e))
        })?;

        Ok(body.site_entry)
    }

    /// Reads one page of the page dimension, returning the reported page URLs
    async fn query_pages(
        &self,
        property: &str,
        request: &QueryRequest<'_>,
    ) -> Result<Vec<String>, SourceError> {
        let encoded: String = url::form_urlencoded::byte_serialize(property.as_bytes()).collect();
        let url = format!("{}sites/{}/searchAnalytics/query", self.api_base, encoded);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_send_error("Search Console query", &e))?;

        let response = check_status("Search Console query", response)?;
        let body: QueryResponse = response.json().await.map_err(|e| {
            SourceError::unavailable(format!("malformed Search Console response: {}", e))
        })?;

        Ok(body
            .rows
            .into_iter()
            .filter_map(|row| row.keys.into_iter().next())
            .collect())
    }
}

fn check_status(context: &str, response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::unavailable(
            format!("{} not authorized (HTTP {})", context, status.as_u16()),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(SourceError::transient(format!(
            "{} rate limited (HTTP 429)",
            context
        ))),
        _ => Err(SourceError::unavailable(format!(
            "{} returned HTTP {}",
            context,
            status.as_u16()
        ))),
    }
}

/// Search Console tier (rank 1)
pub struct ConsoleSource {
    client: ConsoleClient,
    lookback_days: u32,
    row_limit: u32,
    max_pages: u32,
}

impl ConsoleSource {
    pub fn new(client: ConsoleClient, config: &ConsoleConfig) -> Self {
        Self {
            client,
            lookback_days: config.lookback_days,
            row_limit: config.row_limit.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Picks the first accessible property covering the host of `sample_url`
    async fn find_property(&self, sample_url: &str) -> Result<String, SourceError> {
        let host = extract_host(sample_url)
            .map_err(|e| SourceError::unavailable(format!("cannot derive host: {}", e)))?;

        let sites = self.client.list_sites().await?;
        let accessible: Vec<&SiteEntry> = sites.iter().filter(|s| s.is_accessible()).collect();

        if accessible.is_empty() {
            return Err(SourceError::unavailable(
                "no accessible Search Console properties",
            ));
        }

        accessible
            .iter()
            .find(|s| property_covers(&s.site_url, &host))
            .map(|s| s.site_url.clone())
            .ok_or_else(|| {
                SourceError::unavailable(format!("no Search Console property covers {}", host))
            })
    }
}

#[async_trait]
impl Source for ConsoleSource {
    fn tier(&self) -> Tier {
        Tier::Console
    }

    fn batch_size(&self) -> Option<usize> {
        None
    }

    async fn resolve(
        &self,
        urls: &[String],
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Vec<Outcome>, SourceError> {
        let Some(first) = urls.first() else {
            return Ok(Vec::new());
        };

        let property = self.find_property(first).await?;
        tracing::debug!("Using Search Console property {}", property);

        let end = Utc::now().date_naive();
        let start = end - Duration::days(i64::from(self.lookback_days));
        let mut present: HashSet<String> = HashSet::new();
        let mut last_page_full = false;

        for page in 0..self.max_pages {
            if ctx.cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }

            let request = QueryRequest {
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
                dimensions: ["page"],
                row_limit: self.row_limit,
                start_row: page.saturating_mul(self.row_limit),
            };

            let rows = self.client.query_pages(&property, &request).await?;
            last_page_full = rows.len() >= self.row_limit as usize;
            present.extend(rows.iter().map(|u| match_key_lossy(u)));

            tracing::trace!("Search Console page {} returned {} rows", page + 1, rows.len());
            if !last_page_full {
                break;
            }
        }

        if last_page_full {
            tracing::warn!(
                "Search Console data for {} truncated after {} pages of {} rows; \
                 pages beyond the cap are reported as not_indexed",
                property,
                self.max_pages,
                self.row_limit
            );
        }

        let outcomes: Vec<Outcome> = urls
            .iter()
            .map(|u| Outcome::from_indexed(u.as_str(), present.contains(&match_key_lossy(u))))
            .collect();

        let absent = outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::NotIndexed)
            .count();
        if absent > 0 {
            tracing::info!(
                "{} of {} URLs absent from Search Console data reported as not_indexed \
                 (absence may also mean not yet crawled)",
                absent,
                urls.len()
            );
        }

        Ok(outcomes)
    }
}
