use crate::UrlError;
use url::Url;

/// Extracts the lowercase host of a URL string
pub fn extract_host(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    url.host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingHost)
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Returns true if a Search Console property covers the given host
///
/// Two property kinds exist:
/// - URL-prefix properties (`https://www.example.com/`) cover the host when
///   both are equal once a leading `www.` is ignored
/// - Domain properties (`sc-domain:example.com`) cover the domain and every
///   subdomain of it
pub fn property_covers(property: &str, host: &str) -> bool {
    let host = host.to_lowercase();

    if let Some(domain) = property.strip_prefix("sc-domain:") {
        let domain = domain.trim().to_lowercase();
        return host == domain || host.ends_with(&format!(".{}", domain));
    }

    match extract_host(property) {
        Ok(property_host) => strip_www(&property_host) == strip_www(&host),
        Err(_) => false,
    }
}
