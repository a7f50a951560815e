//! Classification of synthetic scheme URLs.
//!
//! ### Surface
//! - `app://host/file/<relative-path>` - bundled asset
//! - `app://host/article-section-data?key=<key>&width=<px>` - rewritten sections
//! - `app://host/api/<host>/<seg1>/<seg2>` - API proxy
//! - `app://host/<percent-encoded absolute URL>` - opaque proxy
//!
//! Classification only looks at the path and query. It never consults the
//! scheme host or any mutable state, so the same URL always yields the same
//! [`Route`].

pub mod urls;

pub use urls::SchemeUrls;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::fetch::url::parse_absolute;

/// First path segment of bundled-file URLs.
pub const FILE_BASE: &str = "file";

/// First path segment of section-data URLs.
pub const SECTION_DATA_BASE: &str = "article-section-data";

/// First path segment of API proxy URLs.
pub const API_BASE: &str = "api";

/// Query parameter carrying the article key.
pub const ARTICLE_KEY_PARAM: &str = "key";

/// Query parameter carrying the target image width.
pub const IMAGE_WIDTH_PARAM: &str = "width";

/// Classified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Bundled asset, path relative to the asset root.
    File { path: String },
    /// Real API endpoint: `https://<host><path>`.
    ApiProxy { host: String, path: String },
    /// Article sections rewritten for `width` pixel wide images.
    SectionData { key: String, width: u32 },
    /// Any other previously-encoded absolute URL.
    OpaqueProxy { url: Url },
    Unroutable,
}

impl Route {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Route::File { .. } => "file",
            Route::ApiProxy { .. } => "api",
            Route::SectionData { .. } => "section-data",
            Route::OpaqueProxy { .. } => "proxy",
            Route::Unroutable => "unroutable",
        }
    }
}

/// Classify a synthetic request URL.
pub fn classify(url: &Url) -> Route {
    let Some(segments) = url.path_segments() else {
        return Route::Unroutable;
    };
    let mut segments: Vec<&str> = segments.collect();
    if segments.last() == Some(&"") {
        segments.pop();
    }

    let Some((first, rest)) = segments.split_first() else {
        return Route::Unroutable;
    };

    match *first {
        FILE_BASE => classify_file(rest),
        SECTION_DATA_BASE => classify_section_data(url),
        API_BASE => classify_api(rest),
        _ => classify_opaque(first, rest, url.query()),
    }
}

fn classify_file(rest: &[&str]) -> Route {
    if rest.is_empty() {
        return Route::Unroutable;
    }

    let mut decoded = Vec::with_capacity(rest.len());
    for segment in rest {
        match percent_decode_str(segment).decode_utf8() {
            Ok(s) => decoded.push(s.into_owned()),
            Err(_) => return Route::Unroutable,
        }
    }

    Route::File { path: decoded.join("/") }
}

fn classify_section_data(url: &Url) -> Route {
    let mut key = None;
    let mut width = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            ARTICLE_KEY_PARAM => key = Some(value.into_owned()),
            IMAGE_WIDTH_PARAM => width = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    match (key, width) {
        (Some(key), Some(width)) if !key.is_empty() && width > 0 => Route::SectionData { key, width },
        _ => Route::Unroutable,
    }
}

fn classify_api(rest: &[&str]) -> Route {
    let [host, first, second] = rest else {
        return Route::Unroutable;
    };
    if host.is_empty() || first.is_empty() || second.is_empty() {
        return Route::Unroutable;
    }

    Route::ApiProxy { host: host.to_ascii_lowercase(), path: format!("/{first}/{second}") }
}

fn classify_opaque(first: &str, rest: &[&str], query: Option<&str>) -> Route {
    let Ok(decoded) = percent_decode_str(first).decode_utf8() else {
        return Route::Unroutable;
    };
    let Ok(mut original) = parse_absolute(&decoded) else {
        return Route::Unroutable;
    };

    if !rest.is_empty() {
        let Ok(mut path) = original.path_segments_mut() else {
            return Route::Unroutable;
        };
        path.pop_if_empty();
        for segment in rest {
            let Ok(segment) = percent_decode_str(segment).decode_utf8() else {
                return Route::Unroutable;
            };
            path.push(&segment);
        }
    }

    if original.query().is_none()
        && let Some(query) = query
    {
        original.set_query(Some(query));
    }

    Route::OpaqueProxy { url: original }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(s: &str) -> Route {
        classify(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_root_is_unroutable() {
        assert_eq!(route("app://host/"), Route::Unroutable);
        assert_eq!(route("app://host"), Route::Unroutable);
    }

    #[test]
    fn test_file_route() {
        assert_eq!(route("app://host/file/index.html"), Route::File { path: "index.html".into() });
        assert_eq!(route("app://host/file/css/app.css"), Route::File { path: "css/app.css".into() });
        assert_eq!(route("app://host/file/my%20file.js"), Route::File { path: "my file.js".into() });
    }

    #[test]
    fn test_file_route_without_path() {
        assert_eq!(route("app://host/file"), Route::Unroutable);
        assert_eq!(route("app://host/file/"), Route::Unroutable);
    }

    #[test]
    fn test_encoded_traversal_survives_to_dispatcher() {
        // The URL parser strips literal dot segments; encoded slashes are
        // decoded here and rejected by the file route.
        assert_eq!(route("app://host/file/..%2F..%2Fetc%2Fpasswd"), Route::File { path: "../../etc/passwd".into() });
    }

    #[test]
    fn test_section_data_route() {
        assert_eq!(
            route("app://host/article-section-data?key=Rust&width=320"),
            Route::SectionData { key: "Rust".into(), width: 320 }
        );
        assert_eq!(
            route("app://host/article-section-data?width=640&key=https%3A%2F%2Fen.example.org%2Fwiki%2FRust"),
            Route::SectionData { key: "https://en.example.org/wiki/Rust".into(), width: 640 }
        );
    }

    #[test]
    fn test_section_data_invalid_params() {
        assert_eq!(route("app://host/article-section-data?key=Rust"), Route::Unroutable);
        assert_eq!(route("app://host/article-section-data?width=320"), Route::Unroutable);
        assert_eq!(route("app://host/article-section-data?key=Rust&width=0"), Route::Unroutable);
        assert_eq!(route("app://host/article-section-data?key=Rust&width=-5"), Route::Unroutable);
        assert_eq!(route("app://host/article-section-data?key=Rust&width=wide"), Route::Unroutable);
        assert_eq!(route("app://host/article-section-data?key=&width=320"), Route::Unroutable);
    }

    #[test]
    fn test_api_route() {
        assert_eq!(
            route("app://host/api/en.example.org/w/api.php"),
            Route::ApiProxy { host: "en.example.org".into(), path: "/w/api.php".into() }
        );
    }

    #[test]
    fn test_api_route_wrong_segment_count() {
        assert_eq!(route("app://host/api/en.example.org/api.php"), Route::Unroutable);
        assert_eq!(route("app://host/api/en.example.org/w/x/api.php"), Route::Unroutable);
        assert_eq!(route("app://host/api"), Route::Unroutable);
    }

    #[test]
    fn test_opaque_route() {
        let expected = Url::parse("https://upload.example.org/a/ab/Photo.jpg").unwrap();
        assert_eq!(
            route("app://host/https%3A%2F%2Fupload.example.org%2Fa%2Fab%2FPhoto.jpg"),
            Route::OpaqueProxy { url: expected }
        );
    }

    #[test]
    fn test_opaque_route_keeps_query() {
        let Route::OpaqueProxy { url } = route("app://host/https%3A%2F%2Fexample.org%2Fx?lang=en") else {
            panic!("expected opaque route");
        };
        assert_eq!(url.as_str(), "https://example.org/x?lang=en");
    }

    #[test]
    fn test_opaque_route_appends_segments() {
        let Route::OpaqueProxy { url } = route("app://host/https%3A%2F%2Fexample.org%2Fdir/page.html") else {
            panic!("expected opaque route");
        };
        assert_eq!(url.as_str(), "https://example.org/dir/page.html");
    }

    #[test]
    fn test_opaque_route_undecodable() {
        assert_eq!(route("app://host/not-a-url/at-all"), Route::Unroutable);
        assert_eq!(route("app://host/ftp%3A%2F%2Fexample.org%2Fx"), Route::Unroutable);
    }

    #[test]
    fn test_classification_ignores_scheme_host() {
        assert_eq!(route("app://other/file/a.css"), route("app://host/file/a.css"));
    }
}
