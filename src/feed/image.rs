//! In-document image resolution: everything that can be learned from the
//! feed item itself, without touching the network.
//!
//! Resolvers run in a fixed order and the first one that yields a URL wins.
//! Items that come out of this chain empty are candidates for the remote
//! lookups in [`super::remote`].
use std::sync::LazyLock;

use regex::Regex;

use super::xml::XmlNode;

pub(crate) static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("valid img src regex")
});
static IMAGE_EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpe?g|png|gif|webp|avif|svg)").expect("valid image extension regex")
});

/// URL substrings that mark an enclosure as an image even without a MIME
/// type or file extension (image CDNs that serve extensionless paths).
const IMAGE_URL_HINTS: &[&str] = &["image", "cloudinary"];

/// Media RSS fields, in priority order.
const MEDIA_FIELDS: &[&str] = &["media:content", "media:thumbnail"];

/// HTML body fields scanned for an inline `<img>`, in priority order.
const BODY_FIELDS: &[&str] = &["content:encoded", "content", "description"];

type Resolver = fn(&XmlNode) -> Option<String>;

/// The in-document chain, in evaluation order.
const RESOLVERS: &[(&str, Resolver)] = &[
    ("media", from_media),
    ("enclosure", from_enclosure),
    ("inline", from_inline_html),
];

/// Runs the in-document resolvers against one raw item.
pub fn resolve_embedded(item: &XmlNode) -> Option<String> {
    RESOLVERS.iter().find_map(|(name, resolve)| {
        let found = resolve(item);
        if let Some(url) = &found {
            tracing::trace!(resolver = *name, url = %url, "Embedded image found");
        }
        found
    })
}

fn first_url_attr<'a>(mut nodes: impl Iterator<Item = &'a XmlNode>) -> Option<String> {
    nodes
        .find_map(|n| n.attr("url").map(str::trim).filter(|u| !u.is_empty()))
        .map(str::to_string)
}

/// `media:content` / `media:thumbnail`, directly on the item or wrapped in a
/// `media:group` (YouTube and some podcast feeds).
pub fn from_media(item: &XmlNode) -> Option<String> {
    let direct = MEDIA_FIELDS
        .iter()
        .find_map(|field| first_url_attr(item.children_named(field)));
    if direct.is_some() {
        return direct;
    }

    item.children_named("media:group").find_map(|group| {
        MEDIA_FIELDS
            .iter()
            .find_map(|field| first_url_attr(group.children_named(field)))
    })
}

/// First `<enclosure>` that looks like an image.
pub fn from_enclosure(item: &XmlNode) -> Option<String> {
    item.children_named("enclosure").find_map(|enclosure| {
        let url = enclosure.attr("url").map(str::trim).filter(|u| !u.is_empty())?;
        is_image_enclosure(enclosure.attr("type"), url).then(|| url.to_string())
    })
}

/// Accepts a declared `image/*` type, a known image extension, or a CDN hint
/// in the URL. Podcast audio and video enclosures fail all three.
pub fn is_image_enclosure(mime: Option<&str>, url: &str) -> bool {
    mime.is_some_and(|t| t.trim().starts_with("image/"))
        || IMAGE_EXT_RE.is_match(url)
        || IMAGE_URL_HINTS.iter().any(|hint| url.contains(hint))
}

/// First `<img src>` in the item's HTML body.
///
/// Escaped or CDATA bodies are plain text in the tree and are scanned with a
/// pattern; XHTML-typed Atom content arrives as child elements and is walked.
pub fn from_inline_html(item: &XmlNode) -> Option<String> {
    BODY_FIELDS
        .iter()
        .filter_map(|field| item.child(field))
        .find_map(|body| {
            first_img_src(&body.text).or_else(|| {
                body.find_descendant("img")
                    .and_then(|img| img.attr("src"))
                    .filter(|src| !src.is_empty())
                    .map(str::to_string)
            })
        })
}

/// `src` of the first `<img>` tag in an HTML string.
pub fn first_img_src(html: &str) -> Option<String> {
    IMG_SRC_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}
