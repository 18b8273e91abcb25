use crate::model::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a website wants its URLs checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckingMethod {
    /// Best available tier, downgrading on failure
    #[default]
    Auto,
    /// Search Console data only
    #[serde(alias = "gsc")]
    Console,
    /// Bulk-check API only
    #[serde(alias = "indexed_api")]
    BulkApi,
    /// Search-result scraping only
    #[serde(alias = "google_search")]
    Scrape,
}

impl CheckingMethod {
    /// The single tier a non-auto method pins the run to
    pub fn forced_tier(&self) -> Option<Tier> {
        match self {
            Self::Auto => None,
            Self::Console => Some(Tier::Console),
            Self::BulkApi => Some(Tier::BulkApi),
            Self::Scrape => Some(Tier::Scrape),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Console => "console",
            Self::BulkApi => "bulk_api",
            Self::Scrape => "scrape",
        }
    }
}

impl fmt::Display for CheckingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "console" | "gsc" => Ok(Self::Console),
            "bulk_api" | "indexed_api" => Ok(Self::BulkApi),
            "scrape" | "google_search" => Ok(Self::Scrape),
            other => Err(format!(
                "unknown checking method '{}' (expected auto, console, bulk_api or scrape)",
                other
            )),
        }
    }
}

/// A website whose URLs should be checked in one run
///
/// Immutable for the duration of a run: the engine only ever borrows it.
/// The JSON shape follows the website list handed over by the configuration
/// collaborator, including the legacy field and method spellings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteTarget {
    pub name: String,

    /// URLs to check, in sitemap order
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sitemap_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_sitemaps: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether a verified Search Console property exists for this site
    #[serde(default, alias = "console_available")]
    pub gsc_available: Option<bool>,

    #[serde(default)]
    pub checking_method: CheckingMethod,

    /// Only the first `url_limit` URLs are checked
    #[serde(default)]
    pub url_limit: Option<usize>,

    #[serde(default, alias = "indexed_api_key", skip_serializing)]
    pub bulk_api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl WebsiteTarget {
    /// Creates an enabled `auto` target over the given URLs
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            urls,
            sitemap_url: None,
            sitemap_urls: Vec::new(),
            exclude_sitemaps: Vec::new(),
            enabled: true,
            gsc_available: None,
            checking_method: CheckingMethod::Auto,
            url_limit: None,
            bulk_api_key: None,
        }
    }

    pub fn with_method(mut self, method: CheckingMethod) -> Self {
        self.checking_method = method;
        self
    }

    pub fn with_bulk_api_key(mut self, key: impl Into<String>) -> Self {
        self.bulk_api_key = Some(key.into());
        self
    }

    pub fn with_url_limit(mut self, limit: usize) -> Self {
        self.url_limit = Some(limit);
        self
    }

    /// The ordered URLs a run processes: trimmed, blanks dropped, `url_limit` applied
    pub fn urls_to_check(&self) -> Vec<String> {
        let urls = self
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        match self.url_limit {
            Some(limit) => urls.take(limit).collect(),
            None => urls.collect(),
        }
    }

    /// True unless the website explicitly opted out of Search Console
    pub fn console_allowed(&self) -> bool {
        self.gsc_available != Some(false)
    }

    pub fn has_bulk_api_key(&self) -> bool {
        self.bulk_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// File-name friendly form of the website name
    pub fn safe_name(&self) -> String {
        self.name
            .trim()
            .to_lowercase()
            .replace('&', "and")
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}
