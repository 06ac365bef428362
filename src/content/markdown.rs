//! HTML fragment to Markdown.
//!
//! Block elements become paragraphs separated by blank lines; inline
//! elements are rendered into the surrounding paragraph. Anything that is
//! page chrome rather than article text is dropped outright.
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
/// Characters that would otherwise start emphasis, code or a link.
static MARKDOWN_SPECIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\*_`\[\]]").expect("valid markdown escape regex"));

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "canvas", "form", "button",
    "input", "select", "textarea", "nav", "footer", "aside", "head", "meta", "link",
];

/// Transparent block containers: their children are converted as blocks.
const CONTAINER_TAGS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "figure", "table", "thead",
    "tbody", "tfoot", "details", "dl", "center", "address", "li",
];

/// Blocks whose content is a single paragraph of inline text.
const PARAGRAPH_TAGS: &[&str] = &["p", "figcaption", "dt", "dd", "summary", "caption"];

const HORIZONTAL_RULE: &str = "* * *";

/// Converts an HTML fragment into Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut converter = Converter::default();
    converter.container(fragment.root_element());
    converter.finish()
}

#[derive(Default)]
struct Converter {
    blocks: Vec<String>,
    /// Inline text collected since the last block boundary.
    pending: String,
}

impl Converter {
    fn finish(mut self) -> String {
        self.flush();
        self.blocks.join("\n\n")
    }

    fn flush(&mut self) {
        let text = tidy(&self.pending);
        self.pending.clear();
        if !text.is_empty() {
            self.blocks.push(text);
        }
    }

    fn push_block(&mut self, block: String) {
        self.flush();
        if !block.trim().is_empty() {
            self.blocks.push(block);
        }
    }

    fn container(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.pending.push_str(&text_run(text)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.element(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED_TAGS.contains(&name) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(name.as_bytes()[1] - b'0');
                let text = tidy(&inline_children(el)).replace('\n', " ");
                if !text.is_empty() {
                    self.push_block(format!("{} {}", "#".repeat(level), text));
                }
            }
            "pre" => self.push_block(code_block(el)),
            "ul" | "ol" => self.push_block(list(el, name == "ol", 0).join("\n")),
            "blockquote" => {
                let mut inner = Converter::default();
                inner.container(el);
                self.push_block(quote(&inner.finish()));
            }
            "hr" => self.push_block(HORIZONTAL_RULE.to_string()),
            "tr" => {
                let cells: Vec<String> = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .map(|c| tidy(&inline_children(c)).replace('\n', " "))
                    .collect();
                self.push_block(cells.join(" | "));
            }
            _ if PARAGRAPH_TAGS.contains(&name) => self.push_block(tidy(&inline_children(el))),
            _ if CONTAINER_TAGS.contains(&name) => {
                self.flush();
                self.container(el);
                self.flush();
            }
            _ => self.pending.push_str(&inline(el)),
        }
    }
}

fn inline(el: ElementRef<'_>) -> String {
    let name = el.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return String::new();
    }

    match name {
        "br" => "\n".to_string(),
        "img" => image(el),
        "code" | "kbd" | "samp" | "tt" => {
            let code: String = el.text().collect();
            let code = code.trim();
            if code.is_empty() {
                String::new()
            } else {
                format!("`{}`", code)
            }
        }
        "strong" | "b" => emphasize("**", inline_children(el)),
        "em" | "i" => emphasize("_", inline_children(el)),
        "del" | "s" | "strike" => emphasize("~~", inline_children(el)),
        "a" => link(el),
        _ => inline_children(el),
    }
}

fn inline_children(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text_run(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    out.push_str(&inline(child));
                }
            }
            _ => {}
        }
    }
    out
}

/// Wraps the trimmed content in `marker`, keeping outer spacing outside it.
fn emphasize(marker: &str, content: String) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content;
    }
    let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

fn link(el: ElementRef<'_>) -> String {
    let text = inline_children(el);
    let href = el.value().attr("href").map(str::trim).unwrap_or_default();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return text;
    }
    let label = text.trim();
    if label.is_empty() {
        return String::new();
    }
    format!("[{}]({})", label, href)
}

fn image(el: ElementRef<'_>) -> String {
    match el.value().attr("src").map(str::trim) {
        Some(src) if !src.is_empty() => {
            let alt = el.value().attr("alt").unwrap_or_default().trim();
            format!("![{}]({})", alt, src)
        }
        _ => String::new(),
    }
}

fn code_block(pre: ElementRef<'_>) -> String {
    let code_el = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code");
    let language = code_el
        .and_then(language_of)
        .or_else(|| language_of(pre))
        .unwrap_or_default();

    let code: String = pre.text().collect();
    format!("```{}\n{}\n```", language, code.trim_end_matches(['\n', '\r']))
}

/// `rust` from `class="language-rust"` or `class="lang-rust"`.
fn language_of(el: ElementRef<'_>) -> Option<String> {
    el.value().classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn list(el: ElementRef<'_>, ordered: bool, depth: usize) -> Vec<String> {
    let start = el
        .value()
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let indent = "  ".repeat(depth);

    let mut lines = Vec::new();
    let items = el
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.value().name() == "li");

    for (idx, li) in items.enumerate() {
        let marker = if ordered {
            format!("{}.", start + idx)
        } else {
            "-".to_string()
        };

        let mut text = String::new();
        let mut nested = Vec::new();
        for child in li.children() {
            match child.value() {
                Node::Text(t) => text.push_str(&text_run(t)),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    match child.value().name() {
                        "ul" => nested.extend(list(child, false, depth + 1)),
                        "ol" => nested.extend(list(child, true, depth + 1)),
                        name if PARAGRAPH_TAGS.contains(&name) || CONTAINER_TAGS.contains(&name) => {
                            text.push(' ');
                            text.push_str(&inline_children(child));
                            text.push(' ');
                        }
                        _ => text.push_str(&inline(child)),
                    }
                }
                _ => {}
            }
        }

        let text = tidy(&text).replace('\n', " ");
        lines.push(format!("{}{} {}", indent, marker, text).trim_end().to_string());
        lines.extend(nested);
    }
    lines
}

fn quote(body: &str) -> String {
    body.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A text node as Markdown: whitespace squeezed, markup characters escaped.
fn text_run(text: &str) -> String {
    let squeezed = WHITESPACE_RE.replace_all(text, " ");
    MARKDOWN_SPECIAL_RE.replace_all(&squeezed, r"\$0").into_owned()
}

/// Trims each line and drops leading and trailing blank lines.
fn tidy(text: &str) -> String {
    text.lines()
        .map(|line| WHITESPACE_RE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
