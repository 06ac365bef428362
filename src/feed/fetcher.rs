use thiserror::Error;

use super::parser::{parse_feed, ParseResult};
use super::remote::{enrich_missing_images, RemoteImageConfig};
use super::xml::XmlError;
use crate::article::Article;
use crate::http::{self, FetchConfig, FetchError};
use crate::util::UrlPolicy;

/// Errors that can occur while fetching and parsing one feed.
///
/// [`fetch_feed`] never surfaces these; they are logged and turned into an
/// empty article list. [`try_fetch_feed`] returns them for callers that need
/// to tell "empty feed" from "broken feed".
#[derive(Debug, Error)]
pub enum FeedError {
    /// Feed document could not be retrieved
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Feed document is not well-formed XML
    #[error("Parse error: {0}")]
    Parse(#[from] XmlError),
}

/// Everything a feed fetch needs besides the client.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub fetch: FetchConfig,
    pub images: RemoteImageConfig,
    pub policy: UrlPolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::feed(),
            images: RemoteImageConfig::default(),
            policy: UrlPolicy::default(),
        }
    }
}

/// Fetches a feed and returns its normalized articles in document order.
///
/// Unreachable sources, non-2xx responses, and malformed or unrecognized
/// documents all yield an empty list with a `warn` log. Nothing is retried.
pub async fn fetch_feed(
    client: &reqwest::Client,
    settings: &FeedSettings,
    url: &str,
    source: &str,
) -> Vec<Article> {
    match try_fetch_feed(client, settings, url, source).await {
        Ok(articles) => articles,
        Err(e) => {
            tracing::warn!(feed = %url, source = %source, error = %e, "Feed fetch failed");
            Vec::new()
        }
    }
}

/// Like [`fetch_feed`] but reports fetch and parse failures.
///
/// # Errors
///
/// - [`FeedError::Fetch`] for disallowed URLs, transport failures, timeouts,
///   non-2xx responses and oversized bodies
/// - [`FeedError::Parse`] for malformed XML
pub async fn try_fetch_feed(
    client: &reqwest::Client,
    settings: &FeedSettings,
    url: &str,
    source: &str,
) -> Result<Vec<Article>, FeedError> {
    settings.policy.check(url).map_err(FetchError::from)?;

    let bytes = http::get_bytes(client, url, &settings.fetch).await?;

    let ParseResult {
        dialect,
        mut items,
        skipped,
    } = parse_feed(&bytes, source)?;

    match dialect {
        Some(dialect) => tracing::debug!(
            feed = %url,
            dialect = ?dialect,
            items = items.len(),
            "Feed parsed"
        ),
        None => tracing::warn!(feed = %url, "Document is not a recognized RSS, RDF or Atom feed"),
    }

    if skipped > 0 {
        tracing::warn!(
            feed = %url,
            filtered = skipped,
            "Items without a link were dropped"
        );
    }

    enrich_missing_images(client, &settings.images, &mut items).await;

    Ok(items.into_iter().map(|item| item.article).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings() -> FeedSettings {
        FeedSettings {
            images: RemoteImageConfig {
                policy: UrlPolicy::PERMISSIVE,
                ..RemoteImageConfig::default()
            },
            policy: UrlPolicy::PERMISSIVE,
            ..FeedSettings::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_feed_end_to_end() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();
        let rss = format!(
            r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Blog</title>
    <item>
      <title>With thumbnail</title>
      <link>https://blog.example.com/1</link>
      <media:thumbnail url="https://cdn.example.com/1.jpg"/>
    </item>
    <item>
      <title>Needs lookup</title>
      <link>{base}/post/2</link>
    </item>
    <item>
      <title>No link</title>
    </item>
  </channel>
</rss>"#
        );

        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(header("accept", http::FEED_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/post/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><meta content="https://cdn.example.com/og.png" property="og:image"></head></html>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let articles = fetch_feed(
            &client,
            &test_settings(),
            &format!("{}/feed.xml", base),
            "Blog",
        )
        .await;

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "With thumbnail");
        assert_eq!(
            articles[0].image_url.as_deref(),
            Some("https://cdn.example.com/1.jpg")
        );
        assert_eq!(articles[1].url, format!("{}/post/2", base));
        assert_eq!(
            articles[1].image_url.as_deref(),
            Some("https://cdn.example.com/og.png")
        );
        assert!(articles.iter().all(|a| a.source == "Blog"));
    }

    #[tokio::test]
    async fn test_http_error_yields_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let articles = fetch_feed(&client, &test_settings(), &mock_server.uri(), "X").await;
        assert!(articles.is_empty());

        let err = try_fetch_feed(&client, &test_settings(), &mock_server.uri(), "X").await;
        assert!(matches!(err, Err(FeedError::Fetch(FetchError::HttpStatus(404)))));
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_documents_yield_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><p>hi</p></body></html>"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let base = mock_server.uri();

        let broken = try_fetch_feed(&client, &test_settings(), &format!("{}/broken", base), "X").await;
        assert!(matches!(broken, Err(FeedError::Parse(_))));

        let html = fetch_feed(&client, &test_settings(), &format!("{}/html", base), "X").await;
        assert!(html.is_empty());
    }

    #[tokio::test]
    async fn test_private_host_rejected_by_default() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result =
            try_fetch_feed(&client, &FeedSettings::default(), &mock_server.uri(), "X").await;
        assert!(matches!(
            result,
            Err(FeedError::Fetch(FetchError::InvalidUrl(_)))
        ));
    }
}
