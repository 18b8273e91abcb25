//! Indexation Checker: multi-source search-index resolution
//!
//! This crate determines, for the URLs of a website, whether each URL is
//! indexed by a search engine. It queries up to three data sources of
//! differing cost and reliability (Search Console data, a paid bulk-check
//! API, and search-result scraping), applies them in priority order, and
//! reconciles their outputs into one verdict per URL.

pub mod config;
pub mod engine;
pub mod model;
pub mod output;
pub mod schedule;
pub mod sources;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for indexation checker operations
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration for {website}: {reason}")]
    ConfigurationInvalid { website: String, reason: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::UrlState,
        to: state::UrlState,
    },

    #[error("Invalid run transition: {from:?} -> {to:?}")]
    InvalidRunTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse website list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for indexation checker operations
pub type Result<T> = std::result::Result<T, CheckerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, WebsiteList};
pub use engine::{Checker, RateLimiter, ResolutionEngine, RunHandle, SourceSelector};
pub use model::{
    CheckingMethod, Outcome, RunResult, RunStatus, Tier, UrlCheckRecord, Verdict, WebsiteTarget,
};
pub use output::ResultSink;
pub use sources::{Source, SourceError, SourceSet};
pub use state::{RunState, UrlState};
pub use tokio_util::sync::CancellationToken;
