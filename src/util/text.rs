use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Matches a tag, or an unterminated `<` running to the end of the input.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";

/// Removes everything that looks like an HTML tag.
///
/// Returns `Cow::Borrowed` when the input contains no `<` (common case for
/// plain-text feed descriptions).
pub fn strip_tags(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }
    TAG_RE.replace_all(s, "")
}

/// Decodes the entities that survive one round of XML unescaping in feed
/// bodies: `&nbsp;`, the XML builtins and their numeric forms, and the
/// typographic HTML entities publishers commonly leave in titles.
///
/// `&amp;` is decoded last so `&amp;lt;` becomes `&lt;`, not `<`.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&#xa0;", " "),
        ("&copy;", "\u{a9}"),
        ("&reg;", "\u{ae}"),
        ("&trade;", "\u{2122}"),
        ("&mdash;", "\u{2014}"),
        ("&ndash;", "\u{2013}"),
        ("&hellip;", "\u{2026}"),
        ("&lsquo;", "\u{2018}"),
        ("&rsquo;", "\u{2019}"),
        ("&ldquo;", "\u{201c}"),
        ("&rdquo;", "\u{201d}"),
        ("&laquo;", "\u{ab}"),
        ("&raquo;", "\u{bb}"),
        ("&middot;", "\u{b7}"),
        ("&bull;", "\u{2022}"),
        ("&yen;", "\u{a5}"),
        ("&euro;", "\u{20ac}"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#34;", "\""),
        ("&#39;", "'"),
        ("&#x27;", "'"),
        ("&apos;", "'"),
        ("&amp;", "&"),
    ];

    let mut out = s.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    Cow::Owned(out)
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// Truncates a string to at most `max_chars` characters.
///
/// If truncation is necessary, appends "..." after the kept characters, so the
/// result is at most `max_chars + 3` characters long. Counting is by Unicode
/// scalar value, never by byte, so multi-byte text never splits mid-codepoint.
///
/// # Examples
///
/// ```
/// use feeddeck::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello...");
/// assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
    }
}

/// Strips tags, decodes entities and trims, producing display text from an
/// HTML fragment.
pub fn html_to_plain(s: &str) -> String {
    let stripped = strip_tags(s);
    decode_entities(&stripped).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert!(matches!(strip_tags("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_unterminated_tag() {
        // An unclosed tag swallows the remainder
        assert_eq!(strip_tags("before <img src=\"x"), "before ");
    }

    #[test]
    fn test_decode_nbsp_and_builtins() {
        assert_eq!(decode_entities("a&nbsp;b"), "a b");
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&quot;q&quot; &#39;s&#39;"), "\"q\" 's'");
    }

    #[test]
    fn test_decode_typographic() {
        assert_eq!(
            decode_entities("&copy; 2025 &mdash; &ldquo;Rust&rdquo;&hellip;"),
            "\u{a9} 2025 \u{2014} \u{201c}Rust\u{201d}\u{2026}"
        );
    }

    #[test]
    fn test_decode_amp_last() {
        assert_eq!(decode_entities("&amp;lt;tag&amp;gt;"), "&lt;tag&gt;");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_truncate_exact_fit() {
        assert_eq!(truncate_chars("12345", 5), "12345");
        assert_eq!(truncate_chars("123456", 5), "12345...");
    }

    #[test]
    fn test_truncate_zero() {
        assert_eq!(truncate_chars("abc", 0), "...");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_html_to_plain() {
        assert_eq!(
            html_to_plain("<p>Rust&nbsp;1.80 <a href=\"x\">released</a></p>\n"),
            "Rust 1.80 released"
        );
    }

    proptest! {
        #[test]
        fn truncated_length_is_bounded(s in "\\PC{0,400}", max in 0usize..200) {
            let out = truncate_chars(&s, max);
            let len = s.chars().count();
            prop_assert!(out.chars().count() <= max + 3);
            if len > max {
                prop_assert_eq!(out.chars().count(), max + 3);
                prop_assert!(out.ends_with("..."));
            } else {
                prop_assert_eq!(out.as_ref(), s.as_str());
            }
        }
    }
}
