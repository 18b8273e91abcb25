//! Runs that start on the Search Console tier

use crate::common::{
    bulk_source, console_source, console_source_paged, fast_settings, mount_console_pages,
    mount_console_sites, page_urls, scrape_source, BulkResponder,
};
use indexation_checker::engine::{Checker, ResolutionEngine};
use indexation_checker::model::{
    CheckingMethod, RunResult, RunStatus, Tier, Verdict, WebsiteTarget,
};
use indexation_checker::output::MemorySink;
use indexation_checker::sources::SourceSet;
use indexation_checker::{CancellationToken, CheckerError, UrlState};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[tokio::test]
async fn test_console_override_marks_absent_pages_not_indexed() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);

    mount_console_sites(&server).await;
    // The dataset reports every page but the last, with a trailing-slash variant
    let mut reported: Vec<String> = urls[..9].to_vec();
    reported[0].push('/');
    mount_console_pages(&server, &reported).await;

    let target = WebsiteTarget::new("Console Site", urls.clone()).with_method(CheckingMethod::Console);
    let sources = SourceSet::new(scrape_source(&server)).with_console(console_source(&server));
    let sink = MemorySink::new();

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &sink, &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier, Some(Tier::Console));
    assert_eq!(result.checked, 10);
    assert_eq!(result.indexed, 9);
    assert_eq!(result.not_indexed, 1);
    assert_eq!(result.errored, 0);

    let last = &result.records[9];
    assert_eq!(last.url, urls[9]);
    assert_eq!(last.verdict, Some(Verdict::NotIndexed));

    // Records come back in input order and every one reached the sink
    for (i, record) in result.records.iter().enumerate() {
        assert_eq!(record.position, i);
        assert_eq!(record.tier, Some(Tier::Console));
    }
    assert_eq!(sink.len(), 10);
}

#[tokio::test]
async fn test_console_rejection_downgrades_to_bulk_api() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 6);

    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/check"))
        .respond_with(BulkResponder::default())
        .mount(&server)
        .await;

    let target = WebsiteTarget::new("Fallback Site", urls).with_bulk_api_key("test-key");
    let sources = SourceSet::new(scrape_source(&server))
        .with_console(console_source(&server))
        .with_bulk_api(bulk_source(&server, 4));
    let sink = MemorySink::new();

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &sink, &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier, Some(Tier::BulkApi));
    assert_eq!(result.tiers_attempted, vec![Tier::Console, Tier::BulkApi]);
    assert_eq!(result.indexed, 6);
    assert!(result
        .records
        .iter()
        .all(|r| r.tier == Some(Tier::BulkApi)));
}

#[tokio::test]
async fn test_pinned_console_failure_fails_the_run() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 4);

    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    // Must never be reached once the pinned tier fails
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let target = WebsiteTarget::new("Pinned Site", urls).with_method(CheckingMethod::Console);
    let sources = SourceSet::new(scrape_source(&server)).with_console(console_source(&server));
    let sink = MemorySink::new();

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &sink, &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.tiers_attempted, vec![Tier::Console]);
    assert_eq!(result.errored, 4);
    assert!(result.error.is_some());
    for record in &result.records {
        assert_eq!(record.state, UrlState::Errored);
        assert_eq!(record.verdict, Some(Verdict::Unknown));
        assert!(record.error.as_deref().unwrap_or("").contains("403"));
    }
    assert_eq!(sink.len(), 4);
}

#[tokio::test]
async fn test_no_matching_property_is_unavailable() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 2);

    Mock::given(method("GET"))
        .and(path("/webmasters/v3/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "siteEntry": [{"siteUrl": "https://elsewhere.example/", "permissionLevel": "siteOwner"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"/searchAnalytics/query$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let target = WebsiteTarget::new("Unmatched Site", urls).with_method(CheckingMethod::Console);
    let sources = SourceSet::new(scrape_source(&server)).with_console(console_source(&server));

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &MemorySink::new(), &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap_or("")
        .contains("no Search Console property"));
}

#[tokio::test]
async fn test_start_rejects_console_override_without_handle() {
    let server = MockServer::start().await;

    let target = WebsiteTarget::new("No Console", page_urls(&server.uri(), 3))
        .with_method(CheckingMethod::Console);
    let sources = SourceSet::new(scrape_source(&server));

    let checker = Checker::new(fast_settings());
    let outcome = checker.start(target, sources, Arc::new(MemorySink::new()));

    assert!(matches!(
        outcome,
        Err(CheckerError::ConfigurationInvalid { .. })
    ));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

/// Serves the requested `startRow`/`rowLimit` window of a performance dataset
struct PagedDataset {
    rows: Vec<String>,
    stop: Option<CancellationToken>,
}

impl Respond for PagedDataset {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let start = body["startRow"].as_u64().unwrap_or(0) as usize;
        let limit = body["rowLimit"].as_u64().unwrap_or(0) as usize;

        let window: Vec<_> = self
            .rows
            .iter()
            .skip(start)
            .take(limit)
            .map(|p| json!({"keys": [p], "clicks": 1, "impressions": 10}))
            .collect();

        if let Some(stop) = &self.stop {
            stop.cancel();
        }

        ResponseTemplate::new(200).set_body_json(json!({ "rows": window }))
    }
}

async fn mount_paged_dataset(server: &MockServer, dataset: PagedDataset) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/webmasters/v3/sites/.+/searchAnalytics/query$"))
        .respond_with(dataset)
        .mount(server)
        .await;
}

async fn query_start_rows(server: &MockServer) -> Vec<u64> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/searchAnalytics/query"))
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap_or_default();
            body["startRow"].as_u64().unwrap_or(u64::MAX)
        })
        .collect()
}

async fn run_paged(
    server: &MockServer,
    urls: Vec<String>,
    row_limit: u32,
    max_pages: u32,
    stop: &CancellationToken,
) -> RunResult {
    let target = WebsiteTarget::new("Paged Site", urls).with_method(CheckingMethod::Console);
    let sources = SourceSet::new(scrape_source(server))
        .with_console(console_source_paged(server, row_limit, max_pages));

    let engine = ResolutionEngine::new(fast_settings());
    engine.run(&target, &sources, &MemorySink::new(), stop).await
}

#[tokio::test]
async fn test_console_reads_every_page_until_short_page() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);

    mount_console_sites(&server).await;
    mount_paged_dataset(
        &server,
        PagedDataset {
            rows: urls[..9].to_vec(),
            stop: None,
        },
    )
    .await;

    let result = run_paged(&server, urls.clone(), 4, 10, &CancellationToken::new()).await;

    assert_eq!(query_start_rows(&server).await, vec![0, 4, 8]);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier, Some(Tier::Console));
    assert_eq!(result.indexed, 9);
    assert_eq!(result.not_indexed, 1);
    assert_eq!(result.records[9].url, urls[9]);
    assert_eq!(result.records[9].verdict, Some(Verdict::NotIndexed));
}

#[tokio::test]
async fn test_console_page_cap_leaves_later_rows_unread() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);

    mount_console_sites(&server).await;
    mount_paged_dataset(
        &server,
        PagedDataset {
            rows: urls[..9].to_vec(),
            stop: None,
        },
    )
    .await;

    let result = run_paged(&server, urls, 4, 2, &CancellationToken::new()).await;

    assert_eq!(query_start_rows(&server).await, vec![0, 4]);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.indexed, 8);
    assert_eq!(result.not_indexed, 2);
    assert_eq!(result.records[8].verdict, Some(Verdict::NotIndexed));
    assert_eq!(result.records[9].verdict, Some(Verdict::NotIndexed));
}

#[tokio::test]
async fn test_stop_between_console_pages_records_nothing() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);
    let stop = CancellationToken::new();

    mount_console_sites(&server).await;
    // Stop is requested while the first full page is being served
    mount_paged_dataset(
        &server,
        PagedDataset {
            rows: urls[..9].to_vec(),
            stop: Some(stop.clone()),
        },
    )
    .await;

    let result = run_paged(&server, urls, 4, 10, &stop).await;

    assert_eq!(query_start_rows(&server).await, vec![0]);
    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.checked, 0);
    assert!(result.records.is_empty());
    assert_eq!(result.not_attempted, 10);
}
