//! Builders for synthetic scheme URLs.
//!
//! Every builder is the inverse of [`classify`](super::classify): a URL built
//! here classifies back to the route it was built from.

use url::Url;

use super::{API_BASE, ARTICLE_KEY_PARAM, FILE_BASE, IMAGE_WIDTH_PARAM, Route, SECTION_DATA_BASE, classify};
use crate::fetch::url::UrlError;

/// Scheme and host of synthetic URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeUrls {
    base: Url,
}

impl SchemeUrls {
    /// Create a builder for `<scheme>://<host>/...` URLs.
    pub fn new(scheme: &str, host: &str) -> Result<Self, UrlError> {
        if scheme.is_empty() || host.is_empty() {
            return Err(UrlError::Empty);
        }
        let base = Url::parse(&format!("{scheme}://{host}/")).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(UrlError::InvalidUrl(format!("{scheme}://{host}")));
        }
        Ok(Self { base })
    }

    pub fn scheme(&self) -> &str {
        self.base.scheme()
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// Whether `url` uses this scheme and host.
    pub fn owns(&self, url: &Url) -> bool {
        url.scheme() == self.base.scheme() && url.host_str() == self.base.host_str()
    }

    /// `app://host/file/<relative>`.
    pub fn file_url(&self, relative: &str) -> Url {
        let segments = relative.split('/').filter(|s| !s.is_empty());
        self.with_segments(std::iter::once(FILE_BASE).chain(segments))
    }

    /// `app://host/article-section-data?key=<key>&width=<width>`.
    pub fn section_data_url(&self, key: &str, width: u32) -> Url {
        let mut url = self.with_segments([SECTION_DATA_BASE]);
        url.query_pairs_mut()
            .append_pair(ARTICLE_KEY_PARAM, key)
            .append_pair(IMAGE_WIDTH_PARAM, &width.to_string());
        url
    }

    /// `app://host/api/<host>/<seg1>/<seg2>` for an API path such as
    /// `/w/api.php`.
    pub fn api_url(&self, host: &str, path: &str) -> Url {
        let segments = path.split('/').filter(|s| !s.is_empty());
        self.with_segments([API_BASE, host].into_iter().chain(segments))
    }

    /// Wrap an absolute URL as a single opaque path segment.
    pub fn proxy_url(&self, original: &Url) -> Url {
        self.with_segments([original.as_str()])
    }

    /// Recover the absolute URL wrapped by [`proxy_url`](Self::proxy_url).
    ///
    /// Returns `None` for URLs of another scheme or host, or for any other
    /// route kind.
    pub fn original_url(&self, url: &Url) -> Option<Url> {
        if !self.owns(url) {
            return None;
        }
        match classify(url) {
            Route::OpaqueProxy { url } => Some(url),
            _ => None,
        }
    }

    /// Resolve a reference that may be a proxied URL, an absolute URL or a
    /// path relative to `base`.
    pub fn resolve(&self, base: &Url, reference: &str) -> Option<Url> {
        let joined = base.join(reference.trim()).ok()?;
        if let Some(original) = self.original_url(&joined) {
            return Some(original);
        }
        match joined.scheme() {
            "http" | "https" => Some(joined),
            _ => None,
        }
    }

    fn with_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        url
    }
}

impl Default for SchemeUrls {
    fn default() -> Self {
        Self { base: Url::parse("app://host/").unwrap_or_else(|_| unreachable!("static URL parses")) }
    }
}
