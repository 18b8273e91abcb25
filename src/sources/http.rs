//! HTTP client builders shared by the sources

use crate::config::EngineConfig;
use rand::seq::SliceRandom;
use reqwest::{redirect::Policy, Client};

const API_USER_AGENT: &str = concat!("indexation-checker/", env!("CARGO_PKG_VERSION"));

/// Desktop browser User-Agent strings, rotated per scrape request
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Builds the client used by the Search Console and bulk-check tiers
///
/// Every request is bounded by the configured request timeout.
pub fn build_api_client(config: &EngineConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(API_USER_AGENT)
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the client used by the scraping tier
///
/// Cookies are kept so consent interstitials are only served once; the
/// User-Agent is set per request from [`random_user_agent`].
pub fn build_scrape_client(config: &EngineConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .cookie_store(true)
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Select a random User-Agent string from the rotation list
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}
