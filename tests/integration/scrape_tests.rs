//! Runs on the scraping tier, including throttling and stop requests

use crate::common::{
    fast_settings, mount_search, page_urls, queried_url, requests_to, results_page, scrape_source,
    scrape_source_with_timeout, SearchResponder,
};
use indexation_checker::engine::{Checker, ResolutionEngine};
use indexation_checker::model::{
    CheckingMethod, RunResult, RunStatus, Tier, UrlCheckRecord, Verdict, WebsiteTarget,
};
use indexation_checker::output::{MemorySink, ResultSink, SinkResult};
use indexation_checker::sources::SourceSet;
use indexation_checker::CancellationToken;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[tokio::test]
async fn test_scrape_reads_result_links() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 3);

    mount_search(
        &server,
        SearchResponder {
            not_indexed: HashSet::from([urls[1].clone()]),
            ..SearchResponder::default()
        },
    )
    .await;

    let target = WebsiteTarget::new("Scrape Site", urls).with_method(CheckingMethod::Scrape);
    let sources = SourceSet::new(scrape_source(&server));

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &MemorySink::new(), &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier, Some(Tier::Scrape));
    let verdicts: Vec<_> = result.records.iter().map(|r| r.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            Some(Verdict::Indexed),
            Some(Verdict::NotIndexed),
            Some(Verdict::Indexed)
        ]
    );
}

#[tokio::test]
async fn test_persistent_throttling_only_affects_one_url() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);

    mount_search(
        &server,
        SearchResponder {
            throttled: HashSet::from([urls[3].clone()]),
            ..SearchResponder::default()
        },
    )
    .await;

    let target = WebsiteTarget::new("Throttled Site", urls).with_method(CheckingMethod::Scrape);
    let sources = SourceSet::new(scrape_source(&server));

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &MemorySink::new(), &CancellationToken::new())
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.checked, 10);
    assert_eq!(result.indexed, 9);
    assert_eq!(result.errored, 1);

    let throttled = &result.records[3];
    assert_eq!(throttled.verdict, Some(Verdict::Unknown));
    assert!(throttled
        .error
        .as_deref()
        .unwrap_or("")
        .contains("throttled"));
}

/// Collects records and requests a stop after a fixed number of deliveries
struct StopAfter {
    inner: MemorySink,
    limit: usize,
    stop: CancellationToken,
}

impl ResultSink for StopAfter {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        self.inner.deliver(record)?;
        if self.inner.len() >= self.limit {
            self.stop.cancel();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_stop_keeps_resolved_records() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 10);
    mount_search(&server, SearchResponder::default()).await;

    let target = WebsiteTarget::new("Stopped Site", urls).with_method(CheckingMethod::Scrape);
    let sources = SourceSet::new(scrape_source(&server));
    let stop = CancellationToken::new();
    let sink = StopAfter {
        inner: MemorySink::new(),
        limit: 5,
        stop: stop.clone(),
    };

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine.run(&target, &sources, &sink, &stop).await;

    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.checked, 5);
    assert_eq!(result.not_attempted, 5);
    assert_eq!(sink.inner.len(), 5);
    for (i, record) in result.records.iter().enumerate() {
        assert_eq!(record.position, i);
        assert_eq!(record.verdict, Some(Verdict::Indexed));
    }
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let server = MockServer::start().await;
    mount_search(&server, SearchResponder::default()).await;

    let checker = Checker::new(fast_settings());
    let alpha_sink = Arc::new(MemorySink::new());
    let beta_sink = Arc::new(MemorySink::new());

    let alpha = checker
        .start(
            WebsiteTarget::new("Alpha", page_urls(&format!("{}/alpha", server.uri()), 4)),
            SourceSet::new(scrape_source(&server)),
            alpha_sink.clone(),
        )
        .unwrap();
    let beta = checker
        .start(
            WebsiteTarget::new("Beta", page_urls(&format!("{}/beta", server.uri()), 6)),
            SourceSet::new(scrape_source(&server)),
            beta_sink.clone(),
        )
        .unwrap();

    // Stopping one run leaves the other untouched
    beta.signal_stop();

    let alpha = alpha.wait().await;
    let beta = beta.wait().await;

    assert_eq!(alpha.status, RunStatus::Completed);
    assert_eq!(alpha.checked, 4);
    assert_eq!(alpha_sink.len(), 4);
    assert_eq!(beta.status, RunStatus::Stopped);
    assert_eq!(beta.checked + beta.not_attempted, 6);
    assert_eq!(beta_sink.len(), beta.checked);
}

#[derive(Clone, Copy)]
enum Blocking {
    TooManyRequests,
    Captcha,
    BotCheckRedirect,
    SlowResponse,
}

/// Blocks the first `blocked` searches, then answers normally
struct BlockedThenOpen {
    blocking: Blocking,
    blocked: usize,
    hits: AtomicUsize,
}

impl BlockedThenOpen {
    fn new(blocking: Blocking, blocked: usize) -> Self {
        Self {
            blocking,
            blocked,
            hits: AtomicUsize::new(0),
        }
    }
}

impl Respond for BlockedThenOpen {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let open = ResponseTemplate::new(200)
            .set_body_string(results_page(&queried_url(request)))
            .insert_header("content-type", "text/html");

        if self.hits.fetch_add(1, Ordering::SeqCst) >= self.blocked {
            return open;
        }

        match self.blocking {
            Blocking::TooManyRequests => ResponseTemplate::new(429),
            Blocking::Captcha => ResponseTemplate::new(200).set_body_string(
                "<html><body><p>Our systems have detected unusual traffic from your computer network.</p>\
                 <div class=\"g-recaptcha\"></div></body></html>",
            ),
            Blocking::BotCheckRedirect => {
                ResponseTemplate::new(302).insert_header("location", "/sorry/index")
            }
            Blocking::SlowResponse => open.set_delay(Duration::from_millis(1500)),
        }
    }
}

/// Checks a single URL against a search endpoint that blocks the first two attempts
async fn check_through_blocking(blocking: Blocking, timeout_secs: u64) -> (RunResult, usize) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(BlockedThenOpen::new(blocking, 2))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sorry/index"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>bot check</html>"))
        .mount(&server)
        .await;

    let urls = page_urls(&server.uri(), 1);
    let target = WebsiteTarget::new("Blocked Site", urls).with_method(CheckingMethod::Scrape);
    let sources = SourceSet::new(scrape_source_with_timeout(&server, timeout_secs));

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &sources, &MemorySink::new(), &CancellationToken::new())
        .await;

    let searches = requests_to(&server, "/search").await.len();
    (result, searches)
}

fn assert_recovered(result: &RunResult, searches: usize) {
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier, Some(Tier::Scrape));
    assert_eq!(result.checked, 1);
    assert_eq!(result.indexed, 1);
    assert_eq!(result.errored, 0);
    assert_eq!(result.records[0].verdict, Some(Verdict::Indexed));
    assert_eq!(searches, 3);
}

#[tokio::test]
async fn test_recovers_after_http_429() {
    let (result, searches) = check_through_blocking(Blocking::TooManyRequests, 5).await;
    assert_recovered(&result, searches);
}

#[tokio::test]
async fn test_recovers_after_captcha_page() {
    let (result, searches) = check_through_blocking(Blocking::Captcha, 5).await;
    assert_recovered(&result, searches);
}

#[tokio::test]
async fn test_recovers_after_bot_check_redirect() {
    let (result, searches) = check_through_blocking(Blocking::BotCheckRedirect, 5).await;
    assert_recovered(&result, searches);
}

#[tokio::test]
async fn test_recovers_after_search_timeouts() {
    let (result, searches) = check_through_blocking(Blocking::SlowResponse, 1).await;
    assert_recovered(&result, searches);
}

#[tokio::test]
async fn test_stop_interrupts_pacing_wait() {
    let server = MockServer::start().await;
    mount_search(&server, SearchResponder::default()).await;

    let mut settings = fast_settings();
    settings.rate_limit.baseline_ms = 5_000;
    settings.rate_limit.ceiling_ms = 5_000;

    let urls = page_urls(&server.uri(), 3);
    let target = WebsiteTarget::new("Paced Site", urls).with_method(CheckingMethod::Scrape);
    let sources = SourceSet::new(scrape_source(&server));
    let stop = CancellationToken::new();

    // The first search goes out at once; the second waits on the 5 s pacing
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let engine = ResolutionEngine::new(settings);
    let result = engine.run(&target, &sources, &MemorySink::new(), &stop).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.checked, 1);
    assert_eq!(result.not_attempted, 2);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].verdict, Some(Verdict::Indexed));
    assert_eq!(requests_to(&server, "/search").await.len(), 1);
}
