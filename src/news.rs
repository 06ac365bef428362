//! Keyword news columns: a search query turned into an aggregator RSS feed.
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::article::Article;
use crate::feed::{fetch_feed, FeedSettings};

pub const SEARCH_ENDPOINT: &str = "https://news.google.com/rss/search";

/// Interface language and edition of the news search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsLocale {
    /// `hl`, e.g. `ja` or `en-US`
    pub language: String,
    /// `gl`, e.g. `JP` or `US`
    pub region: String,
}

impl Default for NewsLocale {
    fn default() -> Self {
        Self {
            language: "ja".to_string(),
            region: "JP".to_string(),
        }
    }
}

/// Where and how keyword columns are searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSettings {
    /// Overridable for tests.
    pub endpoint: String,
    pub locale: NewsLocale,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            endpoint: SEARCH_ENDPOINT.to_string(),
            locale: NewsLocale::default(),
        }
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// RSS search URL for `keywords`.
pub fn search_url(keywords: &str, locale: &NewsLocale) -> String {
    search_url_at(SEARCH_ENDPOINT, keywords, locale)
}

pub fn search_url_at(endpoint: &str, keywords: &str, locale: &NewsLocale) -> String {
    let lang = encode(&locale.language);
    let region = encode(&locale.region);
    format!(
        "{}?q={}&hl={}&gl={}&ceid={}:{}",
        endpoint,
        encode(keywords.trim()),
        lang,
        region,
        region,
        lang
    )
}

/// Fetches the news search feed for `keywords` through the feed pipeline.
///
/// Blank keywords short-circuit to an empty list without a request.
pub async fn fetch_news(
    client: &reqwest::Client,
    feed: &FeedSettings,
    news: &NewsSettings,
    keywords: &str,
    source: &str,
) -> Vec<Article> {
    if keywords.trim().is_empty() {
        tracing::debug!("Skipping news query with blank keywords");
        return Vec::new();
    }
    let url = search_url_at(&news.endpoint, keywords, &news.locale);
    fetch_feed(client, feed, &url, source).await
}
