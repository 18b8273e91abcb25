use crate::UrlError;
use url::Url;

/// Computes the key under which two URLs are considered the same page
///
/// Sources report URLs in slightly different spellings (Search Console rows
/// drop or add trailing slashes, search results carry tracking queries), so
/// every comparison between a requested URL and a reported one goes through
/// this key.
///
/// # Key Rules
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase scheme and host (the `url` crate already does this)
/// 3. Keep a non-default port
/// 4. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash, the root path becomes empty
/// 5. Drop query and fragment
///
/// # Examples
///
/// ```
/// use indexation_checker::url::match_key;
///
/// let a = match_key("https://Example.com/services/").unwrap();
/// let b = match_key("https://example.com/services?utm_source=x").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn match_key(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?;

    let mut key = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(&normalize_path(url.path()));

    Ok(key)
}

/// Match key for URLs that may not parse
///
/// Falls back to the trimmed input without a trailing slash, so a malformed
/// URL still matches an identical spelling.
pub fn match_key_lossy(url_str: &str) -> String {
    match_key(url_str).unwrap_or_else(|_| url_str.trim().trim_end_matches('/').to_string())
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return String::new();
    }

    format!("/{}", segments.join("/"))
}
