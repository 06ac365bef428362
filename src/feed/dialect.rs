//! Dialect detection: decides once per document which item shape applies.
use super::xml::XmlNode;

/// The three feed document shapes in circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// RSS 2.0: `rss/channel/item`
    Rss2,
    /// RSS 1.0: `rdf:RDF/item`
    Rdf,
    /// Atom: `feed/entry`
    Atom,
}

/// One raw item, tagged with the dialect it came from.
#[derive(Debug, Clone, Copy)]
pub enum FeedItem<'a> {
    Rss(&'a XmlNode),
    Rdf(&'a XmlNode),
    Atom(&'a XmlNode),
}

impl<'a> FeedItem<'a> {
    pub fn node(&self) -> &'a XmlNode {
        match self {
            FeedItem::Rss(node) | FeedItem::Rdf(node) | FeedItem::Atom(node) => node,
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            FeedItem::Rss(_) => Dialect::Rss2,
            FeedItem::Rdf(_) => Dialect::Rdf,
            FeedItem::Atom(_) => Dialect::Atom,
        }
    }
}

/// Finds the item collection of a parsed document.
///
/// Checks the RSS channel path, then the RDF path, then the Atom path; the
/// first shape that actually holds items wins. Returns `None` when the
/// document matches none of them (including an RSS channel with no items).
pub fn detect(root: &XmlNode) -> Option<(Dialect, Vec<FeedItem<'_>>)> {
    if root.name == "rss" {
        if let Some(channel) = root.child("channel") {
            let items: Vec<_> = channel.children_named("item").map(FeedItem::Rss).collect();
            if !items.is_empty() {
                return Some((Dialect::Rss2, items));
            }
        }
    }

    if root.name == "rdf:RDF" {
        let items: Vec<_> = root.children_named("item").map(FeedItem::Rdf).collect();
        if !items.is_empty() {
            return Some((Dialect::Rdf, items));
        }
    }

    if root.name == "feed" {
        let items: Vec<_> = root.children_named("entry").map(FeedItem::Atom).collect();
        if !items.is_empty() {
            return Some((Dialect::Atom, items));
        }
    }

    None
}
