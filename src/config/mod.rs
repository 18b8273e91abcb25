//! Configuration module for the indexation checker
//!
//! This module handles loading, parsing, and validating the TOML engine
//! settings and the JSON website list.
//!
//! # Example
//!
//! ```no_run
//! use indexation_checker::config::{load_config, load_websites, websites_path};
//! use std::path::Path;
//!
//! let path = Path::new("config.toml");
//! let config = load_config(path).unwrap();
//! let websites = load_websites(&websites_path(path, &config)).unwrap();
//! println!("{} websites enabled", websites.enabled().count());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BulkApiConfig, Config, ConsoleConfig, EngineConfig, OutputConfig, RateLimitConfig,
    ScrapeConfig, WebsiteList,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_url_list, load_websites,
    websites_path,
};
pub use validation::validate_websites;
