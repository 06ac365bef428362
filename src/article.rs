use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a feed item carries none.
pub const PLACEHOLDER_TITLE: &str = "No Title";

/// The normalized unit every source produces.
///
/// Built once per fetch and never mutated afterwards; callers own caching,
/// deduplication across columns, and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Canonical link, or `"{source}-{millis}"` when the item has none.
    pub id: String,
    pub title: String,
    /// Never empty: items without a link are dropped during parsing.
    pub url: String,
    /// Logical feed/column name supplied by the caller.
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Article {
    /// Derives the stable identifier for an item.
    pub fn make_id(link: &str, source: &str, published_at: &DateTime<Utc>) -> String {
        if link.is_empty() {
            format!("{}-{}", source, published_at.timestamp_millis())
        } else {
            link.to_string()
        }
    }
}
