//! Result delivery to CSV files and the SQLite database

use crate::common::{fast_settings, mount_search, page_urls, scrape_source, SearchResponder};
use indexation_checker::engine::ResolutionEngine;
use indexation_checker::model::{CheckingMethod, RunStatus, WebsiteTarget};
use indexation_checker::output::{
    CsvSink, MemorySink, ResultSink, SharedStorage, SinkSet, SqliteSink,
};
use indexation_checker::sources::SourceSet;
use indexation_checker::state::RunState;
use indexation_checker::storage::{SqliteStorage, Storage};
use indexation_checker::CancellationToken;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_run_persists_to_csv_and_database() {
    let server = MockServer::start().await;
    let urls = page_urls(&server.uri(), 4);
    mount_search(
        &server,
        SearchResponder {
            not_indexed: HashSet::from([urls[0].clone()]),
            ..SearchResponder::default()
        },
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage: SharedStorage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("indexation.db")).unwrap(),
    ));

    let target = WebsiteTarget::new("Persisted Site", urls).with_method(CheckingMethod::Scrape);
    let csv = Arc::new(CsvSink::create(&dir.path().join("results"), &target).unwrap());
    let sqlite = Arc::new(SqliteSink::begin(storage.clone(), &target.name, "hash-1").unwrap());
    let memory = Arc::new(MemorySink::new());
    let sinks = SinkSet::new()
        .with(csv.clone())
        .with(sqlite.clone())
        .with(memory.clone());

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(
            &target,
            &SourceSet::new(scrape_source(&server)),
            &sinks,
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(result.status, RunStatus::Completed);

    // Redelivering every record must not duplicate anything
    for record in &result.records {
        sinks.deliver(record).unwrap();
    }

    let content = std::fs::read_to_string(csv.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "url,verdict,method,timestamp");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].contains("not_indexed"));
    assert!(lines[2].contains(",indexed,scrape,"));

    let guard = storage.lock().unwrap();
    assert_eq!(guard.count_checks(sqlite.run_id()).unwrap(), 4);

    let run = guard.get_run(sqlite.run_id()).unwrap();
    assert_eq!(run.status, RunState::Completed);
    assert_eq!(run.config_hash, "hash-1");
    assert_eq!(run.checked, 4);
    assert_eq!(run.indexed, 3);
    assert_eq!(run.not_indexed, 1);

    assert_eq!(memory.len(), 4);
    assert!(memory.result().is_some());
}

#[tokio::test]
async fn test_stopped_run_leaves_partial_results() {
    let server = MockServer::start().await;
    mount_search(&server, SearchResponder::default()).await;

    let dir = TempDir::new().unwrap();
    let storage: SharedStorage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("indexation.db")).unwrap(),
    ));

    let target = WebsiteTarget::new("Partial Site", page_urls(&server.uri(), 5))
        .with_method(CheckingMethod::Scrape);
    let sqlite = SqliteSink::begin(storage.clone(), &target.name, "hash-2").unwrap();
    let run_id = sqlite.run_id();

    let stop = CancellationToken::new();
    stop.cancel();

    let engine = ResolutionEngine::new(fast_settings());
    let result = engine
        .run(&target, &SourceSet::new(scrape_source(&server)), &sqlite, &stop)
        .await;

    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.not_attempted, 5);

    let guard = storage.lock().unwrap();
    let run = guard.get_run(run_id).unwrap();
    assert_eq!(run.status, RunState::Stopped);
    assert!(run.finished_at.is_some());
    assert_eq!(guard.count_checks(run_id).unwrap(), 0);

    let latest = guard.latest_run("Partial Site").unwrap().unwrap();
    assert_eq!(latest.id, run_id);
}
