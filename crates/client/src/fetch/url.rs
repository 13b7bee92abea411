//! URL resolution and canonicalization for consistent cache keys.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the application origin.
///
/// Absolute paths (`/logo.png`) are joined onto `base`; anything carrying a
/// scheme is parsed as-is, including non-network schemes so the exclusion
/// rules can see them. The result is canonicalized.
pub fn resolve(base: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        base.join(trimmed)
    } else {
        Url::parse(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    canonicalize(parsed)
}

/// Canonicalize a URL for cache keying.
///
/// Normalization steps:
/// 1. Lowercase the host
/// 2. Remove fragment (#...)
/// 3. Keep query string intact (do not reorder)
pub fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    url.set_fragment(None);

    Ok(url)
}

/// Check that a URL can be fetched over the network.
pub fn require_network_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
