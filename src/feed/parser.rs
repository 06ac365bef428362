use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::dialect::{self, Dialect, FeedItem};
use super::image;
use super::xml::{self, XmlError, XmlNode};
use crate::article::{Article, PLACEHOLDER_TITLE};
use crate::util::{collapse_whitespace, decode_entities, html_to_plain, truncate_chars};

/// Summaries are cut to this many characters before the ellipsis.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// Date fields, in priority order.
const DATE_FIELDS: &[&str] = &["pubDate", "dc:date", "published", "updated"];

/// Body fields a summary is taken from, in priority order.
const SUMMARY_FIELDS: &[&str] = &["description", "content:encoded", "summary", "content"];

/// One normalized item plus the context the remote image lookups need.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub article: Article,
    /// Host of the item's `<source url="...">`, when the feed names the
    /// original publisher (news aggregators do).
    pub source_domain: Option<String>,
}

/// Outcome of parsing one feed document.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// `None` when the document matched no known dialect.
    pub dialect: Option<Dialect>,
    /// Items in document order, every one with a non-empty URL.
    pub items: Vec<ParsedItem>,
    /// Items dropped because no link could be resolved.
    pub skipped: usize,
}

/// Parses a feed document of any supported dialect.
///
/// Documents that are well-formed XML but not a recognizable feed produce an
/// empty [`ParseResult`] rather than an error.
///
/// # Errors
///
/// Returns [`XmlError`] when the bytes are not well-formed XML.
pub fn parse_feed(bytes: &[u8], source: &str) -> Result<ParseResult, XmlError> {
    parse_feed_at(bytes, source, Utc::now())
}

/// [`parse_feed`] with an explicit "now" used for undated items.
pub fn parse_feed_at(
    bytes: &[u8],
    source: &str,
    now: DateTime<Utc>,
) -> Result<ParseResult, XmlError> {
    let root = xml::parse_document(bytes)?;

    let Some((dialect, raw_items)) = dialect::detect(&root) else {
        tracing::debug!(root = %root.name, "Document matches no feed dialect");
        return Ok(ParseResult::default());
    };

    let total = raw_items.len();
    let items: Vec<ParsedItem> = raw_items
        .into_iter()
        .map(|item| normalize(item, source, now))
        .filter(|parsed| !parsed.article.url.is_empty())
        .collect();

    Ok(ParseResult {
        dialect: Some(dialect),
        skipped: total - items.len(),
        items,
    })
}

fn normalize(item: FeedItem<'_>, source: &str, now: DateTime<Utc>) -> ParsedItem {
    match item {
        FeedItem::Rss(node) | FeedItem::Rdf(node) => build(node, rss_link(node), source, now),
        FeedItem::Atom(node) => build(node, atom_link(node), source, now),
    }
}

fn build(node: &XmlNode, link: Option<String>, source: &str, now: DateTime<Utc>) -> ParsedItem {
    let url = link.unwrap_or_default();
    let published_at = published_at(node).unwrap_or(now);
    let title = node
        .child_text("title")
        .map(|t| decode_entities(t).into_owned())
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

    ParsedItem {
        article: Article {
            id: Article::make_id(&url, source, &published_at),
            title,
            url,
            source: source.to_string(),
            published_at,
            summary: summary(node),
            image_url: image::resolve_embedded(node),
        },
        source_domain: source_domain(node),
    }
}

/// RSS and RDF carry the link as element text. A permalink `<guid>` stands
/// in when `<link>` is missing, as RSS 2.0 allows.
fn rss_link(node: &XmlNode) -> Option<String> {
    let from_link = node.children_named("link").find_map(|l| {
        let text = l.text.trim();
        if !text.is_empty() {
            Some(text)
        } else {
            l.attr("href").map(str::trim).filter(|h| !h.is_empty())
        }
    });
    if let Some(link) = from_link {
        return Some(link.to_string());
    }

    node.child("guid")
        .filter(|g| g.attr("isPermaLink") != Some("false"))
        .map(|g| g.text.trim())
        .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
        .map(str::to_string)
}

/// Atom links are `href` attributes. With several, the one typed
/// `text/html` or marked `rel="alternate"` wins, else the first.
fn atom_link(node: &XmlNode) -> Option<String> {
    let links: Vec<&XmlNode> = node
        .children_named("link")
        .filter(|l| l.attr("href").is_some_and(|h| !h.trim().is_empty()))
        .collect();

    let chosen = match links.as_slice() {
        [] => None,
        [only] => Some(*only),
        many => many
            .iter()
            .find(|l| l.attr("type") == Some("text/html") || l.attr("rel") == Some("alternate"))
            .or_else(|| many.first())
            .copied(),
    };

    chosen
        .and_then(|l| l.attr("href"))
        .map(|h| h.trim().to_string())
}

fn published_at(node: &XmlNode) -> Option<DateTime<Utc>> {
    let raw = DATE_FIELDS.iter().find_map(|field| node.child_text(field))?;
    let parsed = parse_date(raw);
    if parsed.is_none() {
        tracing::debug!(value = %raw, "Unparseable item date, using fetch time");
    }
    parsed
}

/// Parses the date formats feeds actually use: RFC 2822 (RSS), RFC 3339
/// (Atom, Dublin Core), and a few zone-less variants read as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn summary(node: &XmlNode) -> Option<String> {
    let body = SUMMARY_FIELDS.iter().find_map(|field| {
        let el = node.child(field)?;
        // XHTML content: the markup is already elements, keep the text
        let text = if el.children.is_empty() {
            el.text.trim().to_string()
        } else {
            el.deep_text().trim().to_string()
        };
        Some(text).filter(|t| !t.is_empty())
    })?;

    summarize(&body)
}

/// Turns an HTML body into a display summary: tags stripped, entities
/// decoded, whitespace collapsed, cut at [`SUMMARY_MAX_CHARS`].
pub fn summarize(html: &str) -> Option<String> {
    let plain = collapse_whitespace(&html_to_plain(html));
    if plain.is_empty() {
        return None;
    }
    Some(truncate_chars(&plain, SUMMARY_MAX_CHARS).into_owned())
}

fn source_domain(node: &XmlNode) -> Option<String> {
    let raw = node.child("source")?.attr("url")?;
    url::Url::parse(raw)
        .ok()?
        .host_str()
        .map(str::to_string)
}
