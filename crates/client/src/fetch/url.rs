//! Strict parsing and canonicalization of absolute network URLs.

use url::Url;

/// Error type for URL parsing failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse an absolute `http`/`https` URL.
///
/// Unlike a browser address bar there is no default scheme: `example.com`
/// is rejected, which keeps arbitrary path segments from being mistaken
/// for encoded URLs.
pub fn parse_absolute(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(canonicalize(parsed))
}

/// Canonicalize a URL for cache keys and outbound requests.
///
/// Normalization steps:
/// 1. Lowercase the host
/// 2. Remove fragment (#...)
/// 3. Keep query string intact (do not reorder)
pub fn canonicalize(mut url: Url) -> Url {
    if let Some(host) = url.host_str()
        && host.chars().any(|c| c.is_ascii_uppercase())
    {
        let lowered = host.to_ascii_lowercase();
        // Lowercasing a host that already parsed cannot make it invalid.
        let _ = url.set_host(Some(&lowered));
    }

    url.set_fragment(None);
    url
}
