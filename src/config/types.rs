use crate::model::WebsiteTarget;
use crate::schedule::ScheduleConfig;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the indexation checker
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the JSON website list, relative to the config file
    #[serde(default = "default_websites_path")]
    pub websites: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(rename = "bulk-api", default)]
    pub bulk_api: BulkApiConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_websites_path() -> String {
    "websites.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            websites: default_websites_path(),
            engine: EngineConfig::default(),
            rate_limit: RateLimitConfig::default(),
            console: ConsoleConfig::default(),
            bulk_api: BulkApiConfig::default(),
            scrape: ScrapeConfig::default(),
            output: OutputConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Resolution engine behavior
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on any single network call (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout for every HTTP client (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Consecutive request-level timeouts/throttles before a tier is abandoned
    #[serde(
        rename = "max-consecutive-transient-failures",
        default = "default_max_transient"
    )]
    pub max_consecutive_transient_failures: u32,
}

fn default_request_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_transient() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_consecutive_transient_failures: default_max_transient(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Pacing and backoff for the scraping tier
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Initial inter-request delay (milliseconds)
    #[serde(rename = "baseline-ms", default = "default_baseline_ms")]
    pub baseline_ms: u64,

    /// Maximum inter-request delay after backoff (milliseconds)
    #[serde(rename = "ceiling-ms", default = "default_ceiling_ms")]
    pub ceiling_ms: u64,

    /// Throttle signals tolerated for one URL before it is given up
    #[serde(
        rename = "max-consecutive-throttles",
        default = "default_max_throttles"
    )]
    pub max_consecutive_throttles: u32,

    /// Successes required before the delay is halved again
    #[serde(rename = "relax-after-successes", default = "default_relax_after")]
    pub relax_after_successes: u32,

    /// Random extra delay added to every wait (milliseconds)
    #[serde(rename = "jitter-ms", default)]
    pub jitter_ms: u64,
}

fn default_baseline_ms() -> u64 {
    500
}

fn default_ceiling_ms() -> u64 {
    30_000
}

fn default_max_throttles() -> u32 {
    3
}

fn default_relax_after() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            baseline_ms: default_baseline_ms(),
            ceiling_ms: default_ceiling_ms(),
            max_consecutive_throttles: default_max_throttles(),
            relax_after_successes: default_relax_after(),
            jitter_ms: 0,
        }
    }
}

/// Search Console tier settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Base URL of the Search Console API
    #[serde(rename = "api-base", default = "default_console_api_base")]
    pub api_base: String,

    /// How far back the performance dataset is queried (days)
    #[serde(rename = "lookback-days", default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Rows requested per dataset page
    #[serde(rename = "row-limit", default = "default_row_limit")]
    pub row_limit: u32,

    /// Maximum dataset pages read per run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Environment variable holding a ready OAuth access token
    #[serde(rename = "access-token-env", default = "default_access_token_env")]
    pub access_token_env: String,
}

fn default_console_api_base() -> String {
    "https://www.googleapis.com/webmasters/v3/".to_string()
}

fn default_lookback_days() -> u32 {
    90
}

fn default_row_limit() -> u32 {
    25_000
}

fn default_max_pages() -> u32 {
    10
}

fn default_access_token_env() -> String {
    "GSC_ACCESS_TOKEN".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base: default_console_api_base(),
            lookback_days: default_lookback_days(),
            row_limit: default_row_limit(),
            max_pages: default_max_pages(),
            access_token_env: default_access_token_env(),
        }
    }
}

/// Paid bulk-check API tier settings
#[derive(Debug, Clone, Deserialize)]
pub struct BulkApiConfig {
    /// Base URL of the bulk-check API
    #[serde(default = "default_bulk_endpoint")]
    pub endpoint: String,

    /// URLs submitted per request
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_bulk_endpoint() -> String {
    "https://tool.isindexed.com/api/".to_string()
}

fn default_batch_size() -> usize {
    100
}

impl Default for BulkApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_bulk_endpoint(),
            batch_size: default_batch_size(),
        }
    }
}

/// Search-result scraping tier settings
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// Search endpoint queried with `q=site:<url>`
    #[serde(rename = "search-url", default = "default_search_url")]
    pub search_url: String,

    /// Attempts per URL before it is recorded as unknown
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_search_url() -> String {
    "https://www.google.com/search".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one CSV file per website
    #[serde(rename = "results-dir", default = "default_results_dir")]
    pub results_dir: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

fn default_results_dir() -> String {
    "results".to_string()
}

fn default_database_path() -> String {
    "indexation.db".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            database_path: default_database_path(),
        }
    }
}

/// The JSON website list handed over by the configuration collaborator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsiteList {
    #[serde(default)]
    pub websites: Vec<WebsiteTarget>,
}

impl WebsiteList {
    /// Websites that are switched on, in file order
    pub fn enabled(&self) -> impl Iterator<Item = &WebsiteTarget> {
        self.websites.iter().filter(|w| w.enabled)
    }

    /// Looks up a website by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&WebsiteTarget> {
        self.websites
            .iter()
            .find(|w| w.name.eq_ignore_ascii_case(name))
    }
}
