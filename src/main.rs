//! Indexation checker main entry point
//!
//! This is the command-line interface for the indexation checker.

use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDateTime};
use clap::Parser;
use indexation_checker::config::{
    load_config_with_hash, load_url_list, load_websites, websites_path, Config,
};
use indexation_checker::engine::{Checker, EngineSettings, SourceSelector};
use indexation_checker::model::{CheckingMethod, RunResult, RunStatus, WebsiteTarget};
use indexation_checker::output::{
    load_latest_runs, print_latest_runs, print_run_summary, CsvSink, LogSink, SharedStorage,
    SinkSet, SqliteSink,
};
use indexation_checker::sources::{
    build_api_client, build_scrape_client, BulkApiClient, BulkApiSource, ConsoleClient,
    ConsoleSource, ScrapeSource, SourceSet,
};
use indexation_checker::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Indexation checker: is each URL of a website in the search index?
///
/// Checks every URL of the configured websites against Search Console data,
/// a bulk-check API or search-result scraping, downgrading between them when
/// a source becomes unavailable. Results are written as CSV files and
/// recorded in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "indexation-checker")]
#[command(version)]
#[command(about = "Multi-source search index checker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only check the website with this name
    #[arg(long, value_name = "NAME")]
    website: Option<String>,

    /// Check the URLs listed in this file (one per line) instead of the website's list
    #[arg(long, value_name = "PATH", requires = "website")]
    urls_file: Option<PathBuf>,

    /// Override the checking method of every selected website
    #[arg(long, value_name = "METHOD")]
    method: Option<CheckingMethod>,

    /// Validate config and show what would be checked without checking
    #[arg(long, conflicts_with_all = ["stats", "watch"])]
    dry_run: bool,

    /// Show the latest recorded run of every website and exit
    #[arg(long, conflicts_with_all = ["dry_run", "watch"])]
    stats: bool,

    /// Keep running, checking all websites whenever the schedule is due
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stats {
        return handle_stats(&config);
    }

    let targets = select_targets(&cli, &config)?;

    if cli.dry_run {
        handle_dry_run(&config, &targets)
    } else if cli.watch {
        handle_watch(&config, &config_hash, &targets).await
    } else {
        let storage = open_shared_storage(&config)?;
        let results = run_batch(&config, &config_hash, &targets, &storage).await?;
        print_run_summary(&results);
        Ok(())
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("indexation_checker=info,warn"),
            1 => EnvFilter::new("indexation_checker=debug,info"),
            2 => EnvFilter::new("indexation_checker=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the website list and applies the command-line selection
fn select_targets(cli: &Cli, config: &Config) -> anyhow::Result<Vec<WebsiteTarget>> {
    let path = websites_path(&cli.config, config);
    let list = load_websites(&path)
        .with_context(|| format!("Failed to load website list {}", path.display()))?;

    let mut targets: Vec<WebsiteTarget> = match &cli.website {
        Some(name) => match list.find(name) {
            Some(target) => vec![target.clone()],
            None => bail!("No website named '{}' in {}", name, path.display()),
        },
        None => list.enabled().cloned().collect(),
    };

    if let Some(urls_file) = &cli.urls_file {
        let urls = load_url_list(urls_file)
            .with_context(|| format!("Failed to read URL list {}", urls_file.display()))?;
        for target in &mut targets {
            target.urls = urls.clone();
        }
    }

    if let Some(method) = cli.method {
        for target in &mut targets {
            target.checking_method = method;
        }
    }

    Ok(targets)
}

fn open_shared_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Sources shared by every website of a batch
struct SharedSources {
    base: SourceSet,
    api: reqwest::Client,
}

impl SharedSources {
    fn build(config: &Config) -> anyhow::Result<Self> {
        let api = build_api_client(&config.engine).context("Failed to build API client")?;
        let scrape_client =
            build_scrape_client(&config.engine).context("Failed to build scrape client")?;

        let mut base = SourceSet::new(Arc::new(ScrapeSource::new(scrape_client, &config.scrape)));

        match std::env::var(&config.console.access_token_env) {
            Ok(token) if !token.trim().is_empty() => {
                let client = ConsoleClient::new(api.clone(), &config.console.api_base, token);
                base = base.with_console(Arc::new(ConsoleSource::new(client, &config.console)));
            }
            _ => tracing::info!(
                "{} is not set, the Search Console tier is disabled",
                config.console.access_token_env
            ),
        }

        Ok(Self { base, api })
    }

    /// The source set for one website, adding its bulk-check key if any
    fn for_target(&self, config: &Config, target: &WebsiteTarget) -> SourceSet {
        let key = target
            .bulk_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        match key {
            Some(key) => {
                let client = BulkApiClient::new(self.api.clone(), &config.bulk_api.endpoint, key);
                self.base.clone().with_bulk_api(Arc::new(BulkApiSource::new(
                    client,
                    config.bulk_api.batch_size,
                )))
            }
            None => self.base.clone(),
        }
    }
}

fn build_sinks(
    config: &Config,
    config_hash: &str,
    target: &WebsiteTarget,
    storage: &SharedStorage,
) -> anyhow::Result<SinkSet> {
    let csv = CsvSink::create(Path::new(&config.output.results_dir), target)
        .with_context(|| format!("Failed to create results file for {}", target.name))?;
    let sqlite = SqliteSink::begin(Arc::clone(storage), &target.name, config_hash)
        .with_context(|| format!("Failed to record run for {}", target.name))?;

    Ok(SinkSet::new()
        .with(Arc::new(csv))
        .with(Arc::new(sqlite))
        .with(Arc::new(LogSink::new(target.name.clone()))))
}

/// Runs every target concurrently and waits for all of them
///
/// Ctrl-C asks every run to stop; records resolved so far are kept.
async fn run_batch(
    config: &Config,
    config_hash: &str,
    targets: &[WebsiteTarget],
    storage: &SharedStorage,
) -> anyhow::Result<Vec<RunResult>> {
    let sources = SharedSources::build(config)?;
    let checker = Checker::new(EngineSettings::from(config));

    let mut results = Vec::new();
    let mut handles = Vec::new();

    for target in targets {
        let target_sources = sources.for_target(config, target);

        if let Err(e) = SourceSelector::new(target, &target_sources).select() {
            tracing::error!("Skipping {}: {}", target.name, e);
            results.push(RunResult::failed(&target.name, e.to_string()));
            continue;
        }

        let sinks = match build_sinks(config, config_hash, target, storage) {
            Ok(sinks) => sinks,
            Err(e) => {
                tracing::error!("Skipping {}: {:#}", target.name, e);
                results.push(RunResult::failed(&target.name, format!("{:#}", e)));
                continue;
            }
        };

        match checker.start(target.clone(), target_sources, Arc::new(sinks)) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::error!("Skipping {}: {}", target.name, e);
                results.push(RunResult::failed(&target.name, e.to_string()));
            }
        }
    }

    tracing::info!("Started {} runs", handles.len());

    let stops: Vec<_> = handles.iter().map(|h| h.stop_token()).collect();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stop requested, finishing in-flight requests");
            for stop in &stops {
                stop.cancel();
            }
        }
    });

    for handle in handles {
        results.push(handle.wait().await);
    }
    ctrl_c.abort();

    Ok(results)
}

/// Handles the --dry-run mode: shows what would be checked and with which source
fn handle_dry_run(config: &Config, targets: &[WebsiteTarget]) -> anyhow::Result<()> {
    println!("=== Indexation Checker Dry Run ===\n");

    println!("Engine:");
    println!("  Request timeout: {}s", config.engine.request_timeout_secs);
    println!(
        "  Max consecutive transient failures: {}",
        config.engine.max_consecutive_transient_failures
    );
    println!(
        "  Scrape pacing: {}ms baseline, {}ms ceiling",
        config.rate_limit.baseline_ms, config.rate_limit.ceiling_ms
    );

    println!("\nOutput:");
    println!("  Results: {}", config.output.results_dir);
    println!("  Database: {}", config.output.database_path);

    let sources = SharedSources::build(config)?;

    println!("\nWebsites ({}):", targets.len());
    let mut valid = 0;
    for target in targets {
        let target_sources = sources.for_target(config, target);
        let selection = SourceSelector::new(target, &target_sources).select();

        println!(
            "  - {} ({} URLs, method {})",
            target.name,
            target.urls_to_check().len(),
            target.checking_method
        );
        match selection {
            Ok(tier) => {
                valid += 1;
                println!("    * would start on the {} tier", tier);
            }
            Err(e) => println!("    ! {}", e),
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ {} of {} websites can be checked", valid, targets.len());

    Ok(())
}

/// Handles the --stats mode: shows the latest recorded runs
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let runs = load_latest_runs(&storage)?;
    print_latest_runs(&runs);

    Ok(())
}

/// Handles the --watch mode: checks all websites whenever the schedule is due
async fn handle_watch(
    config: &Config,
    config_hash: &str,
    targets: &[WebsiteTarget],
) -> anyhow::Result<()> {
    if !config.schedule.enabled {
        bail!("--watch requires [schedule] enabled = true");
    }

    let storage = open_shared_storage(config)?;

    loop {
        let last_run = last_run_started(&storage)?;
        let now = Local::now().naive_local();
        let Some(wait) = config.schedule.wait_time(now, last_run) else {
            bail!("The schedule has no upcoming run");
        };

        if !wait.is_zero() {
            tracing::info!("Next scheduled check in {}s", wait.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Stopping watch");
                    return Ok(());
                }
            }
        }

        let results = run_batch(config, config_hash, targets, &storage).await?;
        print_run_summary(&results);

        if results.iter().any(|r| r.status == RunStatus::Stopped) {
            tracing::info!("Stopping watch");
            return Ok(());
        }
    }
}

/// Start time of the most recent recorded run, in local time
fn last_run_started(storage: &SharedStorage) -> anyhow::Result<Option<NaiveDateTime>> {
    let runs = {
        let guard = storage
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock storage: {}", e))?;
        guard.latest_runs()?
    };

    Ok(runs
        .iter()
        .filter_map(|run| DateTime::parse_from_rfc3339(&run.started_at).ok())
        .map(|started| started.with_timezone(&Local).naive_local())
        .max())
}
