use crate::config::types::{Config, WebsiteList};
use crate::config::validation::{validate, validate_websites};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Loads and parses an engine configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use indexation_checker::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Scrape attempts per URL: {}", config.scrape.max_attempts);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every persisted run so result sets produced under
/// different settings can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Loads the JSON website list
pub fn load_websites(path: &Path) -> Result<WebsiteList, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let list: WebsiteList = serde_json::from_str(&content)?;
    validate_websites(&list)?;
    Ok(list)
}

/// Resolves the website list path of `config`, relative to the config file
pub fn websites_path(config_path: &Path, config: &Config) -> PathBuf {
    let websites = Path::new(&config.websites);
    if websites.is_absolute() {
        return websites.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(websites),
        None => websites.to_path_buf(),
    }
}

/// Reads a plain URL list, one URL per line
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_url_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
