//! Deferred image resolution over the network.
//!
//! Only items that the in-document chain left without an image reach this
//! module, and only the first [`RemoteImageConfig::max_lookups`] of them per
//! feed. Every failure here degrades to "no image": a slow or broken
//! publisher must never cost the caller the feed itself.
use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::image::first_img_src;
use super::parser::ParsedItem;
use crate::http::{self, FetchConfig};
use crate::util::UrlPolicy;

/// Default cap on remote lookups per feed fetch.
pub const DEFAULT_MAX_LOOKUPS: usize = 10;

/// Redirect wrappers can point at other redirect wrappers; stop after this many.
const MAX_REDIRECT_HOPS: usize = 3;

static REDIRECT_WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://www\.google\.\w+/url\?").expect("valid redirect wrapper regex")
});
static AGGREGATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://news\.google\.com/(rss/articles|stories)/")
        .expect("valid aggregator regex")
});
static QIITA_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"qiita\.com/([^/]+)/items/([a-f0-9]+)").expect("valid qiita item regex")
});
static OG_PROPERTY_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["']"#)
        .expect("valid og:image regex")
});
static OG_CONTENT_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]+property=["']og:image["']"#)
        .expect("valid og:image fallback regex")
});

/// Settings for the remote lookups.
#[derive(Debug, Clone)]
pub struct RemoteImageConfig {
    /// Page fetches for Open Graph tags.
    pub page_fetch: FetchConfig,
    /// Community API calls.
    pub api_fetch: FetchConfig,
    pub max_lookups: usize,
    /// Origin of the Qiita API (overridable for tests).
    pub qiita_api_base: String,
    /// Favicon service endpoint keyed by `domain=`.
    pub favicon_endpoint: String,
    pub policy: UrlPolicy,
}

impl Default for RemoteImageConfig {
    fn default() -> Self {
        Self {
            page_fetch: FetchConfig::image(),
            api_fetch: FetchConfig::new(FetchConfig::image().timeout, "Mozilla/5.0"),
            max_lookups: DEFAULT_MAX_LOOKUPS,
            qiita_api_base: "https://qiita.com".to_string(),
            favicon_endpoint: "https://www.google.com/s2/favicons".to_string(),
            policy: UrlPolicy::default(),
        }
    }
}

/// How a page URL is handled by [`resolve_remote_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// `www.google.<tld>/url?...`, with the embedded target if present.
    RedirectWrapper(Option<String>),
    /// Aggregator article link that cannot be fetched for metadata.
    AggregatorRedirect,
    /// Qiita article, by item id.
    Qiita(String),
    /// Anything else: fetch and read `og:image`.
    Generic,
}

pub fn classify(page_url: &str) -> PageKind {
    if REDIRECT_WRAPPER_RE.is_match(page_url) {
        return PageKind::RedirectWrapper(redirect_target(page_url));
    }
    if AGGREGATOR_RE.is_match(page_url) {
        return PageKind::AggregatorRedirect;
    }
    if let Some(id) = QIITA_ITEM_RE
        .captures(page_url)
        .and_then(|cap| cap.get(2))
    {
        return PageKind::Qiita(id.as_str().to_string());
    }
    PageKind::Generic
}

/// The `url=` (or `q=`) query parameter of a redirect wrapper.
fn redirect_target(wrapper: &str) -> Option<String> {
    let parsed = Url::parse(wrapper).ok()?;
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    ["url", "q"].iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    })
}

/// Finds an image for one article page. Never fails; `None` means no image.
pub async fn resolve_remote_image(
    client: &reqwest::Client,
    config: &RemoteImageConfig,
    page_url: &str,
    source_domain: Option<&str>,
) -> Option<String> {
    let mut url = page_url.to_string();
    let mut domain = source_domain.map(str::to_string);

    for _ in 0..=MAX_REDIRECT_HOPS {
        match classify(&url) {
            PageKind::RedirectWrapper(Some(target)) => {
                tracing::trace!(from = %url, to = %target, "Following redirect wrapper");
                url = target;
                // The publisher domain belongs to the wrapper, not the target
                domain = None;
            }
            PageKind::RedirectWrapper(None) | PageKind::AggregatorRedirect => {
                return domain.and_then(|d| favicon_url(config, &d));
            }
            PageKind::Qiita(item_id) => return qiita_image(client, config, &item_id).await,
            PageKind::Generic => return og_image(client, config, &url).await,
        }
    }

    tracing::debug!(url = %page_url, "Too many redirect hops, giving up on image");
    None
}

fn favicon_url(config: &RemoteImageConfig, domain: &str) -> Option<String> {
    Url::parse_with_params(&config.favicon_endpoint, &[("domain", domain), ("sz", "128")])
        .ok()
        .map(String::from)
}

#[derive(Debug, Deserialize)]
struct QiitaItem {
    rendered_body: Option<String>,
    user: Option<QiitaUser>,
}

#[derive(Debug, Deserialize)]
struct QiitaUser {
    profile_image_url: Option<String>,
}

/// First image of the rendered article body, else the author's avatar.
async fn qiita_image(
    client: &reqwest::Client,
    config: &RemoteImageConfig,
    item_id: &str,
) -> Option<String> {
    let api_url = format!(
        "{}/api/v2/items/{}",
        config.qiita_api_base.trim_end_matches('/'),
        item_id
    );

    let body = match http::get_text(client, &api_url, &config.api_fetch).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(item_id = %item_id, error = %e, "Qiita API lookup failed");
            return None;
        }
    };

    let item: QiitaItem = match serde_json::from_str(&body) {
        Ok(item) => item,
        Err(e) => {
            tracing::debug!(item_id = %item_id, error = %e, "Unexpected Qiita API payload");
            return None;
        }
    };

    item.rendered_body
        .as_deref()
        .and_then(first_img_src)
        .or_else(|| item.user.and_then(|u| u.profile_image_url))
        .filter(|u| !u.is_empty())
}

async fn og_image(
    client: &reqwest::Client,
    config: &RemoteImageConfig,
    page_url: &str,
) -> Option<String> {
    if let Err(e) = config.policy.check(page_url) {
        tracing::debug!(url = %page_url, error = %e, "Skipping OG lookup for disallowed URL");
        return None;
    }

    match http::get_text(client, page_url, &config.page_fetch).await {
        Ok(html) => extract_og_image(&html, page_url),
        Err(e) => {
            tracing::debug!(url = %page_url, error = %e, "OG image fetch failed");
            None
        }
    }
}

/// Reads `og:image` from a page, accepting either attribute order.
///
/// `&amp;` in the value is decoded and relative values are resolved against
/// `page_url`.
pub fn extract_og_image(html: &str, page_url: &str) -> Option<String> {
    let raw = OG_PROPERTY_FIRST_RE
        .captures(html)
        .or_else(|| OG_CONTENT_FIRST_RE.captures(html))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter(|v| !v.is_empty())?;

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw);
    }
    Url::parse(page_url)
        .and_then(|base| base.join(&raw))
        .map(String::from)
        .ok()
}

/// Fills `image_url` for up to `config.max_lookups` items that lack one.
///
/// Lookups run concurrently and are all awaited; each writes only its own
/// item. Returns how many images were found.
pub async fn enrich_missing_images(
    client: &reqwest::Client,
    config: &RemoteImageConfig,
    items: &mut [ParsedItem],
) -> usize {
    let pending: Vec<(usize, String, Option<String>)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.article.image_url.is_none())
        .take(config.max_lookups)
        .map(|(idx, item)| (idx, item.article.url.clone(), item.source_domain.clone()))
        .collect();

    if pending.is_empty() {
        return 0;
    }

    let lookups = pending.len();
    let results: Vec<(usize, Option<String>)> = stream::iter(pending)
        .map(|(idx, url, domain)| async move {
            let image = resolve_remote_image(client, config, &url, domain.as_deref()).await;
            (idx, image)
        })
        .buffer_unordered(lookups)
        .collect()
        .await;

    let mut found = 0;
    for (idx, image) in results {
        if let Some(image) = image {
            items[idx].article.image_url = Some(image);
            found += 1;
        }
    }

    tracing::debug!(lookups = lookups, found = found, "Remote image enrichment finished");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> RemoteImageConfig {
        RemoteImageConfig {
            qiita_api_base: server.uri(),
            policy: UrlPolicy::PERMISSIVE,
            ..RemoteImageConfig::default()
        }
    }

    fn item(url: &str, image: Option<&str>) -> ParsedItem {
        ParsedItem {
            article: Article {
                id: url.to_string(),
                title: "t".to_string(),
                url: url.to_string(),
                source: "Test".to_string(),
                published_at: Utc::now(),
                summary: None,
                image_url: image.map(str::to_string),
            },
            source_domain: None,
        }
    }

    fn og_page(image: &str) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="x"><meta property="og:image" content="{}"></head><body></body></html>"#,
            image
        )
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("https://www.google.co.jp/url?rct=j&url=https://example.com/a&ct=ga"),
            PageKind::RedirectWrapper(Some("https://example.com/a".to_string()))
        );
        assert_eq!(
            classify("https://www.google.com/url?q=https%3A%2F%2Fexample.com%2Fb"),
            PageKind::RedirectWrapper(Some("https://example.com/b".to_string()))
        );
        assert_eq!(
            classify("https://www.google.com/url?sa=t"),
            PageKind::RedirectWrapper(None)
        );
        assert_eq!(
            classify("https://news.google.com/rss/articles/CBMiK2h0dHBz?oc=5"),
            PageKind::AggregatorRedirect
        );
        assert_eq!(
            classify("https://news.google.com/stories/abc"),
            PageKind::AggregatorRedirect
        );
        assert_eq!(
            classify("https://qiita.com/someone/items/0123abcd"),
            PageKind::Qiita("0123abcd".to_string())
        );
        assert_eq!(classify("https://example.com/post"), PageKind::Generic);
    }

    #[test]
    fn test_extract_og_both_orders() {
        let property_first =
            r#"<meta property="og:image" content="https://x/a.png" />"#;
        let content_first = r#"<META content='https://x/b.png' property='og:image'>"#;
        assert_eq!(
            extract_og_image(property_first, "https://x/").as_deref(),
            Some("https://x/a.png")
        );
        assert_eq!(
            extract_og_image(content_first, "https://x/").as_deref(),
            Some("https://x/b.png")
        );
    }

    #[test]
    fn test_extract_og_ignores_image_dimensions() {
        let html = r#"<meta property="og:image:width" content="1200"><meta property="og:image" content="https://x/c.png">"#;
        assert_eq!(
            extract_og_image(html, "https://x/").as_deref(),
            Some("https://x/c.png")
        );
    }

    #[test]
    fn test_extract_og_relative_and_escaped() {
        let html = r#"<meta property="og:image" content="/img/og.png?w=1&amp;h=2">"#;
        assert_eq!(
            extract_og_image(html, "https://blog.example.com/posts/1").as_deref(),
            Some("https://blog.example.com/img/og.png?w=1&h=2")
        );
    }

    #[test]
    fn test_extract_og_missing() {
        assert_eq!(extract_og_image("<html></html>", "https://x/"), None);
    }

    #[tokio::test]
    async fn test_aggregator_uses_favicon_of_source_domain() {
        let client = reqwest::Client::new();
        let config = RemoteImageConfig::default();
        let url = "https://news.google.com/rss/articles/CBMi?oc=5";

        let image = resolve_remote_image(&client, &config, url, Some("www.nikkei.com")).await;
        assert_eq!(
            image.as_deref(),
            Some("https://www.google.com/s2/favicons?domain=www.nikkei.com&sz=128")
        );

        assert_eq!(resolve_remote_image(&client, &config, url, None).await, None);
    }

    #[tokio::test]
    async fn test_generic_og_lookup() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://cdn.x/og.jpg")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let image = resolve_remote_image(
            &client,
            &test_config(&mock_server),
            &format!("{}/post", mock_server.uri()),
            None,
        )
        .await;
        assert_eq!(image.as_deref(), Some("https://cdn.x/og.jpg"));
    }

    #[tokio::test]
    async fn test_redirect_wrapper_is_followed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/real"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://cdn.x/real.jpg")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let target = format!("{}/real", mock_server.uri());
        let wrapper: String =
            Url::parse_with_params("https://www.google.com/url", &[("url", target.as_str())])
                .unwrap()
                .into();

        let client = reqwest::Client::new();
        let image =
            resolve_remote_image(&client, &test_config(&mock_server), &wrapper, Some("ignored.com"))
                .await;
        assert_eq!(image.as_deref(), Some("https://cdn.x/real.jpg"));
    }

    #[tokio::test]
    async fn test_qiita_body_image_then_avatar() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/items/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"rendered_body":"<p><img src=\"https://qiita-image-store.x/1.png\"></p>","user":{"profile_image_url":"https://avatar.x/u.png"}}"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/items/def456"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"rendered_body":"<p>text only</p>","user":{"profile_image_url":"https://avatar.x/u.png"}}"#,
            ))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let config = test_config(&mock_server);

        let body_image =
            resolve_remote_image(&client, &config, "https://qiita.com/u/items/abc123", None).await;
        assert_eq!(body_image.as_deref(), Some("https://qiita-image-store.x/1.png"));

        let avatar =
            resolve_remote_image(&client, &config, "https://qiita.com/u/items/def456", None).await;
        assert_eq!(avatar.as_deref(), Some("https://avatar.x/u.png"));
    }

    #[tokio::test]
    async fn test_qiita_api_failure_is_no_image() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let image = resolve_remote_image(
            &client,
            &test_config(&mock_server),
            "https://qiita.com/u/items/abc",
            None,
        )
        .await;
        assert_eq!(image, None);
    }

    #[tokio::test]
    async fn test_disallowed_host_is_not_fetched() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://x/y.png")))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let strict = RemoteImageConfig::default();
        let image =
            resolve_remote_image(&client, &strict, &format!("{}/post", mock_server.uri()), None)
                .await;
        assert_eq!(image, None);
    }

    #[tokio::test]
    async fn test_enrichment_is_capped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/p\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://cdn.x/og.jpg")))
            .expect(10)
            .mount(&mock_server)
            .await;

        let mut items: Vec<ParsedItem> = (0..15)
            .map(|i| item(&format!("{}/p{}", mock_server.uri(), i), None))
            .collect();

        let client = reqwest::Client::new();
        let found = enrich_missing_images(&client, &test_config(&mock_server), &mut items).await;

        assert_eq!(found, 10);
        assert!(items[..10].iter().all(|i| i.article.image_url.is_some()));
        assert!(items[10..].iter().all(|i| i.article.image_url.is_none()));
    }

    #[tokio::test]
    async fn test_enrichment_skips_items_with_images() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/needs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://cdn.x/n.jpg")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut items = vec![
            item("https://x/has", Some("https://x/embedded.png")),
            item(&format!("{}/needs", mock_server.uri()), None),
        ];

        let client = reqwest::Client::new();
        enrich_missing_images(&client, &test_config(&mock_server), &mut items).await;

        assert_eq!(items[0].article.image_url.as_deref(), Some("https://x/embedded.png"));
        assert_eq!(items[1].article.image_url.as_deref(), Some("https://cdn.x/n.jpg"));
    }

    #[tokio::test]
    async fn test_enrichment_isolates_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(og_page("https://cdn.x/ok.jpg")))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(og_page("https://cdn.x/slow.jpg"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server);
        config.page_fetch.timeout = Duration::from_millis(300);

        let base = mock_server.uri();
        let mut items = vec![
            item(&format!("{}/broken", base), None),
            item(&format!("{}/slow", base), None),
            item(&format!("{}/ok", base), None),
        ];

        let client = reqwest::Client::new();
        let found = enrich_missing_images(&client, &config, &mut items).await;

        assert_eq!(found, 1);
        assert_eq!(items[0].article.image_url, None);
        assert_eq!(items[1].article.image_url, None);
        assert_eq!(items[2].article.image_url.as_deref(), Some("https://cdn.x/ok.jpg"));
    }
}
