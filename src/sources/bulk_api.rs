//! Paid bulk-check API tier

use super::{classify_send_error, ResolveContext, Source, SourceError};
use crate::model::{Outcome, Tier};
use crate::url::match_key_lossy;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    urls: &'a [String],
}

/// Per-URL verdict as reported by the bulk-check API
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    pub url: String,
    #[serde(default)]
    pub indexed: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    results: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    credits: u64,
}

/// Authenticated bulk-check API handle
#[derive(Clone)]
pub struct BulkApiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl BulkApiClient {
    pub fn new(http: Client, endpoint: &str, api_key: impl Into<String>) -> Self {
        let mut endpoint = endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Self {
            http,
            endpoint,
            api_key: api_key.into(),
        }
    }

    /// Submits one batch of URLs
    pub async fn check(&self, urls: &[String]) -> Result<Vec<BulkItem>, SourceError> {
        let response = self
            .http
            .post(format!("{}check", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&CheckRequest { urls })
            .send()
            .await
            .map_err(|e| classify_send_error("bulk API", &e))?;

        let response = check_status(response)?;
        let body: CheckResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed bulk API response: {}", e)))?;

        Ok(body.results)
    }

    /// Remaining credits on the account
    pub async fn credits_remaining(&self) -> Result<u64, SourceError> {
        let response = self
            .http
            .get(format!("{}credits", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify_send_error("bulk API", &e))?;

        let response = check_status(response)?;
        let body: CreditsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed credits response: {}", e)))?;

        Ok(body.credits)
    }
}

fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::PAYMENT_REQUIRED => Err(SourceError::unavailable(
            "bulk API credits exhausted (HTTP 402)",
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::unavailable(
            format!("bulk API key rejected (HTTP {})", status.as_u16()),
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            Err(SourceError::transient("bulk API rate limited (HTTP 429)"))
        }
        _ => Err(SourceError::unavailable(format!(
            "bulk API returned HTTP {}",
            status.as_u16()
        ))),
    }
}

/// Per-URL progress within one batch
#[derive(Debug, Default, Clone)]
struct Slot {
    indexed: Option<bool>,
    error: Option<String>,
}

/// Fills unresolved slots from a response, matching items by URL match key
fn apply_items(urls: &[String], slots: &mut [Slot], items: &[BulkItem]) {
    let by_key: HashMap<String, &BulkItem> = items
        .iter()
        .map(|item| (match_key_lossy(&item.url), item))
        .collect();

    for (url, slot) in urls.iter().zip(slots.iter_mut()) {
        if slot.indexed.is_some() {
            continue;
        }

        match by_key.get(&match_key_lossy(url)) {
            Some(BulkItem {
                indexed: Some(indexed),
                error: None,
                ..
            }) => {
                slot.indexed = Some(*indexed);
                slot.error = None;
            }
            Some(BulkItem {
                error: Some(error), ..
            }) => slot.error = Some(error.clone()),
            Some(_) => slot.error = Some("indeterminate result".to_string()),
            None => slot.error = Some("missing from bulk API response".to_string()),
        }
    }
}

fn resolved_outcomes(urls: &[String], slots: &[Slot]) -> Vec<Outcome> {
    urls.iter()
        .zip(slots)
        .filter_map(|(url, slot)| slot.indexed.map(|i| Outcome::from_indexed(url.as_str(), i)))
        .collect()
}

/// Bulk-check API tier (rank 2)
pub struct BulkApiSource {
    client: BulkApiClient,
    batch_size: usize,
}

impl BulkApiSource {
    pub fn new(client: BulkApiClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Source for BulkApiSource {
    fn tier(&self) -> Tier {
        Tier::BulkApi
    }

    fn batch_size(&self) -> Option<usize> {
        Some(self.batch_size)
    }

    async fn resolve(
        &self,
        urls: &[String],
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Vec<Outcome>, SourceError> {
        let mut slots = vec![Slot::default(); urls.len()];

        let items = self.client.check(urls).await?;
        apply_items(urls, &mut slots, &items);

        let retry: Vec<String> = urls
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.indexed.is_none())
            .map(|(url, _)| url.clone())
            .collect();

        if !retry.is_empty() && ctx.cancel.is_cancelled() {
            tracing::debug!(
                "Stop requested, not retrying {} unresolved URLs",
                retry.len()
            );
        } else if !retry.is_empty() {
            tracing::debug!("Retrying {} unresolved URLs once", retry.len());

            match self.client.check(&retry).await {
                Ok(items) => apply_items(urls, &mut slots, &items),
                Err(SourceError::TierUnavailable { reason, .. }) => {
                    return Err(SourceError::TierUnavailable {
                        reason,
                        resolved: resolved_outcomes(urls, &slots),
                    });
                }
                Err(e) => {
                    for slot in slots.iter_mut().filter(|s| s.indexed.is_none()) {
                        slot.error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(urls
            .iter()
            .zip(slots)
            .map(|(url, slot)| match slot.indexed {
                Some(indexed) => Outcome::from_indexed(url.as_str(), indexed),
                None => Outcome::unknown(
                    url.as_str(),
                    slot.error
                        .unwrap_or_else(|| "no verdict returned by bulk API".to_string()),
                ),
            })
            .collect())
    }
}
