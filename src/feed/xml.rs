//! Minimal element tree over `quick-xml` events.
//!
//! Feed dialects disagree on where things live, so parsing happens in two
//! steps: build a generic tree here, then let [`super::dialect`] decide which
//! shape it is. Qualified names are kept verbatim (`media:content`,
//! `dc:date`), matching how feeds are written in the wild rather than
//! resolving namespaces.
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted before the document is rejected.
/// Real feeds rarely exceed 10 levels; the cap bounds recursion in the tree
/// walkers below.
const MAX_DEPTH: usize = 64;

/// Longest entity name looked for after a `&` when unescaping leniently.
const MAX_ENTITY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Unclosed element <{0}> at end of document")]
    Unclosed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// Concatenated text and CDATA directly inside this element, whitespace
    /// included.
    pub text: String,
    /// Byte offset into the parent's `text` at which this element appears.
    text_pos: usize,
}

impl XmlNode {
    fn from_start(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Self {
        let mut attrs = Vec::new();
        let decoder = reader.decoder();
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed XML attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.decode_and_unescape_value(decoder) {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attrs.push((key, value));
        }

        Self {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attrs,
            children: Vec::new(),
            text: String::new(),
            text_pos: 0,
        }
    }

    fn push_child(&mut self, mut child: XmlNode) {
        child.text_pos = self.text.len();
        self.children.push(child);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given qualified name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child named `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// All text inside this element in document order, like a DOM
    /// `textContent`. Whitespace is kept as written.
    pub fn deep_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        let mut last = 0;
        for child in &self.children {
            // Offsets always fall on boundaries of pushed text runs
            let pos = child.text_pos.min(self.text.len());
            if let Some(run) = self.text.get(last..pos) {
                out.push_str(run);
            }
            child.collect_text(out);
            last = pos;
        }
        if let Some(rest) = self.text.get(last..) {
            out.push_str(rest);
        }
    }

    /// Depth-first search for the first descendant named `name`.
    pub fn find_descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }
}

/// Parses a complete XML document and returns its root element.
///
/// Text is unescaped exactly once. The five XML builtins and numeric
/// references are resolved; any other entity (`&nbsp;`, `&copy;`) is kept as
/// written instead of failing the whole document.
///
/// # Errors
///
/// Returns [`XmlError`] for malformed markup, mismatched or unclosed tags,
/// documents without a root element, and nesting beyond the depth limit.
pub fn parse_document(bytes: &[u8]) -> Result<XmlNode, XmlError> {
    // No trimming: whitespace between inline XHTML elements is content
    let mut reader = Reader::from_reader(bytes);

    // Synthetic document node at the bottom of the stack
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if stack.len() > MAX_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                }
                stack.push(XmlNode::from_start(&e, &reader));
            }
            Ok(Event::Empty(e)) => {
                let node = XmlNode::from_start(&e, &reader);
                if let Some(parent) = stack.last_mut() {
                    parent.push_child(node);
                }
            }
            Ok(Event::End(_)) => {
                // quick-xml verifies the end name matches the open element
                if stack.len() < 2 {
                    return Err(XmlError::Parse("unexpected closing tag".to_string()));
                }
                if let Some(node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_child(node);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => unescape_lenient(&String::from_utf8_lossy(&e)),
                };
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if stack.len() > 1 {
        let name = stack.last().map(|n| n.name.clone()).unwrap_or_default();
        return Err(XmlError::Unclosed(name));
    }

    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| XmlError::Parse("document has no root element".to_string()))
}

/// Resolves builtin and numeric references, leaving anything unrecognized
/// (including a bare `&`) untouched.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let resolved = tail
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_ENTITY_LEN)
            .and_then(|end| resolve_reference(&tail[..end]).map(|r| (r, end + 1)));
        match resolved {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}
