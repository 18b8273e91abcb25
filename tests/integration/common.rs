//! Shared fixtures for the integration tests

use indexation_checker::config::{
    BulkApiConfig, ConsoleConfig, EngineConfig, RateLimitConfig, ScrapeConfig,
};
use indexation_checker::engine::EngineSettings;
use indexation_checker::sources::{
    build_api_client, build_scrape_client, BulkApiClient, BulkApiSource, ConsoleClient,
    ConsoleSource, ScrapeSource, Source,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Engine settings with millisecond pacing so tests stay fast
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        max_consecutive_transient_failures: 3,
        rate_limit: RateLimitConfig {
            baseline_ms: 1,
            ceiling_ms: 8,
            max_consecutive_throttles: 3,
            relax_after_successes: 5,
            jitter_ms: 0,
        },
    }
}

/// `count` page URLs on the given site, `{site}/page1` onwards
pub fn page_urls(site: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}/page{}", site, i)).collect()
}

fn engine_config() -> EngineConfig {
    engine_config_with_timeout(5)
}

fn engine_config_with_timeout(request_timeout_secs: u64) -> EngineConfig {
    EngineConfig {
        request_timeout_secs,
        connect_timeout_secs: 5,
        max_consecutive_transient_failures: 3,
    }
}

pub fn console_source(server: &MockServer) -> Arc<dyn Source> {
    let defaults = ConsoleConfig::default();
    console_source_paged(server, defaults.row_limit, defaults.max_pages)
}

/// Search Console source reading at most `max_pages` pages of `row_limit` rows
pub fn console_source_paged(server: &MockServer, row_limit: u32, max_pages: u32) -> Arc<dyn Source> {
    let config = ConsoleConfig {
        api_base: format!("{}/webmasters/v3/", server.uri()),
        row_limit,
        max_pages,
        ..ConsoleConfig::default()
    };
    let http = build_api_client(&engine_config()).unwrap();
    let client = ConsoleClient::new(http, &config.api_base, "test-token");
    Arc::new(ConsoleSource::new(client, &config))
}

pub fn bulk_source(server: &MockServer, batch_size: usize) -> Arc<dyn Source> {
    let config = BulkApiConfig {
        endpoint: format!("{}/api/", server.uri()),
        batch_size,
    };
    let http = build_api_client(&engine_config()).unwrap();
    let client = BulkApiClient::new(http, &config.endpoint, "test-key");
    Arc::new(BulkApiSource::new(client, config.batch_size))
}

pub fn scrape_source(server: &MockServer) -> Arc<dyn Source> {
    scrape_source_with_timeout(server, 5)
}

pub fn scrape_source_with_timeout(server: &MockServer, request_timeout_secs: u64) -> Arc<dyn Source> {
    let config = ScrapeConfig {
        search_url: format!("{}/search", server.uri()),
        max_attempts: 3,
    };
    let http = build_scrape_client(&engine_config_with_timeout(request_timeout_secs)).unwrap();
    Arc::new(ScrapeSource::new(http, &config))
}

/// Result page listing `url` behind the engine's redirect wrapper
pub fn results_page(url: &str) -> String {
    format!(
        r#"<html><body><div class="g"><a href="/url?q={}&amp;sa=U">Result</a></div></body></html>"#,
        url
    )
}

/// Requests the server received on `path`
pub async fn requests_to(server: &MockServer, path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == path)
        .collect()
}

/// Mounts a Search Console property list covering the mock server's host
pub async fn mount_console_sites(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "siteEntry": [
                {"siteUrl": "sc-domain:unrelated.example", "permissionLevel": "siteOwner"},
                {"siteUrl": format!("{}/", server.uri()), "permissionLevel": "siteFullUser"}
            ]
        })))
        .mount(server)
        .await;
}

/// Mounts a performance dataset listing the given pages
pub async fn mount_console_pages(server: &MockServer, pages: &[String]) {
    let rows: Vec<_> = pages
        .iter()
        .map(|p| json!({"keys": [p], "clicks": 1, "impressions": 10}))
        .collect();

    Mock::given(method("POST"))
        .and(path_regex(r"^/webmasters/v3/sites/.+/searchAnalytics/query$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": rows })))
        .mount(server)
        .await;
}

/// Search engine stand-in: lists the queried URL as a result unless told otherwise
#[derive(Default)]
pub struct SearchResponder {
    /// URLs that never appear in results
    pub not_indexed: HashSet<String>,
    /// URLs whose queries are always answered with HTTP 429
    pub throttled: HashSet<String>,
}

/// The page URL a search request asks about, without the `site:` operator
pub fn queried_url(request: &Request) -> String {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.trim_start_matches("site:").to_string())
        .unwrap_or_default()
}

impl Respond for SearchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let queried = queried_url(request);

        if self.throttled.contains(&queried) {
            return ResponseTemplate::new(429);
        }

        let body = if self.not_indexed.contains(&queried) {
            "<html><body><p>Your search did not match any documents.</p></body></html>"
                .to_string()
        } else {
            results_page(&queried)
        };

        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/html")
    }
}

pub async fn mount_search(server: &MockServer, responder: SearchResponder) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(responder)
        .mount(server)
        .await;
}

/// Bulk-check API stand-in: answers every submitted URL
#[derive(Default)]
pub struct BulkResponder {
    pub not_indexed: HashSet<String>,
}

impl Respond for BulkResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let results: Vec<_> = body["urls"]
            .as_array()
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.as_str())
                    .map(|u| json!({"url": u, "indexed": !self.not_indexed.contains(u)}))
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({ "results": results }))
    }
}
