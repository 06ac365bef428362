//! Column definitions and the concurrent refresh of all of them.
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::feed::{fetch_feed, FeedSettings};
use crate::news::{fetch_news, NewsSettings};
use crate::trending::{self, fetch_trending, Since, TrendingSettings};

/// Columns refreshed at the same time.
const MAX_CONCURRENT_COLUMNS: usize = 8;

/// What a column shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnKind {
    /// Any RSS 2.0, RSS 1.0 or Atom feed.
    Rss { url: String },
    /// Keyword search over the news aggregator.
    News { keywords: String },
    /// GitHub trending repositories.
    Trending {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        since: Since,
    },
}

/// One configured column.
///
/// ```toml
/// [[columns]]
/// kind = "rss"
/// url = "https://zenn.dev/feed"
/// title = "Zenn"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Value stamped into `Article::source`; defaults to the display title.
    /// Ignored for trending columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            title: None,
            source: None,
            kind,
        }
    }

    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        match &self.kind {
            ColumnKind::Rss { url } => url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| url.clone()),
            ColumnKind::News { keywords } => keywords.trim().to_string(),
            ColumnKind::Trending { language, .. } => match language.as_deref() {
                Some(lang) if !lang.trim().is_empty() => format!("GitHub Trending ({})", lang.trim()),
                _ => "GitHub Trending".to_string(),
            },
        }
    }

    /// Trending repositories are always sourced from GitHub; other kinds use
    /// the configured `source`, else the display title.
    pub fn source_name(&self) -> String {
        if let ColumnKind::Trending { .. } = self.kind {
            return trending::SOURCE_NAME.to_string();
        }
        match self.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(source) => source.to_string(),
            None => self.display_title(),
        }
    }
}

/// Settings shared by every column fetch.
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    pub feed: FeedSettings,
    pub news: NewsSettings,
    pub trending: TrendingSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnResult {
    pub title: String,
    pub column: Column,
    pub articles: Vec<Article>,
}

/// Fetches one column. Failures are logged by the source and yield no
/// articles.
pub async fn refresh_column(
    client: &reqwest::Client,
    settings: &SourceSettings,
    column: &Column,
) -> Vec<Article> {
    let source = column.source_name();
    match &column.kind {
        ColumnKind::Rss { url } => fetch_feed(client, &settings.feed, url, &source).await,
        ColumnKind::News { keywords } => {
            fetch_news(client, &settings.feed, &settings.news, keywords, &source).await
        }
        ColumnKind::Trending { language, since } => {
            fetch_trending(client, &settings.trending, language.as_deref(), *since)
                .await
                .into_iter()
                .map(Article::from)
                .collect()
        }
    }
}

/// Refreshes every column concurrently, returning results in column order.
pub async fn refresh_columns(
    client: &reqwest::Client,
    settings: &SourceSettings,
    columns: &[Column],
) -> Vec<ColumnResult> {
    let results: Vec<ColumnResult> = stream::iter(columns)
        .map(|column| async move {
            let articles = refresh_column(client, settings, column).await;
            tracing::debug!(
                column = %column.display_title(),
                articles = articles.len(),
                "Column refreshed"
            );
            ColumnResult {
                title: column.display_title(),
                column: column.clone(),
                articles,
            }
        })
        .buffered(MAX_CONCURRENT_COLUMNS)
        .collect()
        .await;

    let empty = results.iter().filter(|r| r.articles.is_empty()).count();
    if empty > 0 {
        tracing::info!(empty = empty, total = results.len(), "Some columns returned no articles");
    }
    results
}
