//! Image reference rewriting for article section HTML.
//!
//! Every `<img>` in a fragment is pointed at the proxy route so the renderer
//! loads it through the interceptor:
//!
//! - `src` is resolved against the article base URL and wrapped with
//!   [`SchemeUrls::proxy_url`]. Sources that are already proxied are
//!   unwrapped first, so rewriting twice at the same width is a no-op.
//! - Images at least [`ImagePolicy::min_gallery_width`] x
//!   [`ImagePolicy::min_gallery_height`] get a thumbnail resized for the
//!   target width and a `data-image-gallery="true"` marker.
//! - `srcset` is renamed `data-srcset-disabled` so the renderer does not
//!   fetch alternate resolutions on its own.
//!
//! Text outside image tags is copied through untouched.

pub mod tag;

pub use tag::ImageTag;

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::route::SchemeUrls;

/// Attribute that replaces `srcset`.
pub const SRCSET_DISABLED_ATTR: &str = "data-srcset-disabled";

/// Marker read by the page script for zoom/gallery behaviour.
pub const GALLERY_ATTR: &str = "data-image-gallery";

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\s.*?>").expect("invalid img regex"));

static THUMB_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)px-(.+)$").expect("invalid thumbnail regex"));

/// Sizing policy for gallery inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    /// Minimum declared width (default: 64).
    pub min_gallery_width: u32,
    /// Minimum declared height (default: 64).
    pub min_gallery_height: u32,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self { min_gallery_width: 64, min_gallery_height: 64 }
    }
}

impl ImagePolicy {
    /// Whether the declared size qualifies. Unknown dimensions never do.
    pub fn is_large_enough(&self, width: Option<u32>, height: Option<u32>) -> bool {
        matches!((width, height), (Some(w), Some(h)) if w >= self.min_gallery_width && h >= self.min_gallery_height)
    }
}

/// Rewrites image references in HTML fragments.
#[derive(Debug, Clone, Default)]
pub struct ImageRewriter {
    policy: ImagePolicy,
    urls: SchemeUrls,
}

impl ImageRewriter {
    pub fn new(policy: ImagePolicy, urls: SchemeUrls) -> Self {
        Self { policy, urls }
    }

    pub fn policy(&self) -> &ImagePolicy {
        &self.policy
    }

    /// Rewrite every image tag in `html` for a `target_width` pixel viewport.
    pub fn rewrite(&self, html: &str, base_url: &Url, target_width: u32) -> String {
        let mut out = String::with_capacity(html.len() + html.len() / 4);
        let mut last = 0;

        for found in IMG_TAG.find_iter(html) {
            out.push_str(&html[last..found.start()]);
            match self.rewrite_tag(found.as_str(), base_url, target_width) {
                Some(rewritten) => out.push_str(&rewritten),
                None => out.push_str(found.as_str()),
            }
            last = found.end();
        }

        out.push_str(&html[last..]);
        out
    }

    fn rewrite_tag(&self, raw: &str, base_url: &Url, target_width: u32) -> Option<String> {
        let mut tag = ImageTag::parse(raw);
        let src = tag.get("src").filter(|s| !s.trim().is_empty())?;
        let resolved = self.urls.resolve(base_url, src)?;

        let file_width = tag.dimension("data-file-width");
        let width = file_width.or_else(|| tag.dimension("width"));
        let height = tag.dimension("data-file-height").or_else(|| tag.dimension("height"));

        let gallery = self.policy.is_large_enough(width, height);
        let source = if gallery {
            resize_thumbnail(&resolved, target_width, file_width).unwrap_or(resolved)
        } else {
            resolved
        };

        tag.set("src", self.urls.proxy_url(&source).as_str());
        tag.rename("srcset", SRCSET_DISABLED_ATTR);
        if gallery && !tag.has(GALLERY_ATTR) {
            tag.set(GALLERY_ATTR, "true");
        }

        Some(tag.render())
    }
}

/// Point a `<N>px-<name>` thumbnail URL at a `target_width` pixel rendition.
///
/// The width never exceeds `file_width` when it is known. Returns `None`
/// for URLs that are not thumbnails.
pub fn resize_thumbnail(url: &Url, target_width: u32, file_width: Option<u32>) -> Option<Url> {
    let last = url.path_segments()?.next_back()?;
    let caps = THUMB_PREFIX.captures(last)?;
    let current: u32 = caps.get(1)?.as_str().parse().ok()?;
    let name = caps.get(2)?.as_str();

    let width = file_width.map_or(target_width, |max| target_width.min(max));
    if width == 0 || width == current {
        return Some(url.clone());
    }

    let renamed = format!("{width}px-{name}");
    let mut resized = url.clone();
    {
        let mut path = resized.path_segments_mut().ok()?;
        path.pop().push(&renamed);
    }
    Some(resized)
}
