use crate::config::types::{
    BulkApiConfig, Config, ConsoleConfig, EngineConfig, OutputConfig, RateLimitConfig,
    ScrapeConfig, WebsiteList,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire engine configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.websites.trim().is_empty() {
        return Err(ConfigError::Validation(
            "websites path cannot be empty".to_string(),
        ));
    }

    validate_engine_config(&config.engine)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_console_config(&config.console)?;
    validate_bulk_api_config(&config.bulk_api)?;
    validate_scrape_config(&config.scrape)?;
    validate_output_config(&config.output)?;
    config.schedule.check().map_err(ConfigError::Validation)?;

    Ok(())
}

fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if !(1..=300).contains(&config.request_timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if !(1..=300).contains(&config.connect_timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be between 1 and 300, got {}",
            config.connect_timeout_secs
        )));
    }

    if config.max_consecutive_transient_failures < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-transient-failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.baseline_ms < 1 {
        return Err(ConfigError::Validation(
            "baseline-ms must be >= 1ms".to_string(),
        ));
    }

    if config.baseline_ms > config.ceiling_ms {
        return Err(ConfigError::Validation(format!(
            "baseline-ms ({}) cannot exceed ceiling-ms ({})",
            config.baseline_ms, config.ceiling_ms
        )));
    }

    if config.max_consecutive_throttles < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-throttles must be >= 1".to_string(),
        ));
    }

    if config.relax_after_successes < 1 {
        return Err(ConfigError::Validation(
            "relax-after-successes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_console_config(config: &ConsoleConfig) -> Result<(), ConfigError> {
    validate_base_url("console api-base", &config.api_base)?;

    if !(1..=25_000).contains(&config.row_limit) {
        return Err(ConfigError::Validation(format!(
            "console row-limit must be between 1 and 25000, got {}",
            config.row_limit
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "console max-pages must be >= 1".to_string(),
        ));
    }

    if config.lookback_days < 1 {
        return Err(ConfigError::Validation(
            "console lookback-days must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_bulk_api_config(config: &BulkApiConfig) -> Result<(), ConfigError> {
    validate_base_url("bulk-api endpoint", &config.endpoint)?;

    if !(1..=1000).contains(&config.batch_size) {
        return Err(ConfigError::Validation(format!(
            "bulk-api batch-size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

fn validate_scrape_config(config: &ScrapeConfig) -> Result<(), ConfigError> {
    validate_base_url("scrape search-url", &config.search_url)?;

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "scrape max-attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.results_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "results-dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates the website list: unique non-empty names and parseable URLs
pub fn validate_websites(list: &WebsiteList) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for website in &list.websites {
        let name = website.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "website name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate website name '{}'",
                name
            )));
        }

        for url in website.urls_to_check() {
            Url::parse(&url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid URL '{}' for {}: {}", url, name, e))
            })?;
        }
    }

    Ok(())
}
