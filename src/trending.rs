//! GitHub trending scraper.
//!
//! The trending page has no feed or API, so repositories are cut out of the
//! HTML with patterns: split on the `Box-row` class marker, then one regex
//! per field. This breaks whenever the page markup changes; there is no DOM
//! parse to fall back on.
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::http::{self, FetchConfig, FetchError};
use crate::util::{collapse_whitespace, decode_entities, strip_tags};

pub const TRENDING_BASE_URL: &str = "https://github.com/trending";
pub const MAX_REPOS: usize = 25;
pub const SOURCE_NAME: &str = "GitHub";

const BLOCK_MARKER: &str = r#"class="Box-row""#;

static REPO_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]+href="/([^"]+)"[^>]*class="[^"]*""#).expect("valid repo link regex")
});
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<p[^>]*class="[^"]*"[^>]*>(.*?)</p>"#).expect("valid description regex")
});
static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span[^>]*itemprop="programmingLanguage"[^>]*>([^<]+)</span>"#)
        .expect("valid language regex")
});
static STARS_TODAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)\s*stars?\s*today").expect("valid stars today regex")
});
static TOTAL_STARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*href="/[^"]*/stargazers"[^>]*>\s*(.*?)</a>"#)
        .expect("valid stargazers regex")
});

/// Trending window.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Since {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Since {
    pub fn as_str(&self) -> &'static str {
        match self {
            Since::Daily => "daily",
            Since::Weekly => "weekly",
            Since::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scraped repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingRepo {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: Option<u64>,
    /// As displayed, e.g. `1,024`.
    pub stars_today: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl TrendingRepo {
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn id(&self) -> String {
        format!("gh-{}", self.path())
    }

    pub fn title(&self) -> String {
        format!("{} / {}", self.owner, self.name)
    }

    pub fn url(&self) -> String {
        format!("https://github.com/{}", self.path())
    }

    pub fn avatar_url(&self) -> String {
        format!("https://github.com/{}.png?size=128", self.owner)
    }

    /// `📝 Rust · ⭐ 12,345 · 🔥 +321 today · description`, missing parts omitted.
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(lang) = &self.language {
            parts.push(format!("📝 {}", lang));
        }
        if let Some(stars) = self.stars {
            parts.push(format!("⭐ {}", format_thousands(stars)));
        }
        if let Some(today) = &self.stars_today {
            parts.push(format!("🔥 +{} today", today));
        }
        if let Some(desc) = &self.description {
            parts.push(desc.clone());
        }
        parts.join(" · ")
    }
}

impl From<TrendingRepo> for Article {
    fn from(repo: TrendingRepo) -> Self {
        let summary = repo.summary();
        Article {
            id: repo.id(),
            title: repo.title(),
            url: repo.url(),
            source: SOURCE_NAME.to_string(),
            published_at: repo.fetched_at,
            summary: (!summary.is_empty()).then_some(summary),
            image_url: Some(repo.avatar_url()),
        }
    }
}

/// `1234567` -> `1,234,567`
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn trending_url(base: &str, language: Option<&str>, since: Since) -> String {
    let base = base.trim_end_matches('/');
    match language.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => format!(
            "{}/{}?since={}",
            base,
            url::form_urlencoded::byte_serialize(lang.as_bytes()).collect::<String>(),
            since
        ),
        None => format!("{}?since={}", base, since),
    }
}

/// Cuts repositories out of a trending page, in page order, at most
/// [`MAX_REPOS`]. Blocks without a two-segment repo link are skipped.
pub fn parse_trending_html(html: &str, fetched_at: DateTime<Utc>) -> Vec<TrendingRepo> {
    html.split(BLOCK_MARKER)
        .skip(1)
        .filter_map(|block| parse_block(block, fetched_at))
        .take(MAX_REPOS)
        .collect()
}

fn parse_block(block: &str, fetched_at: DateTime<Utc>) -> Option<TrendingRepo> {
    let path = REPO_LINK_RE.captures(block)?.get(1)?.as_str().trim();
    let (owner, name) = match path.split('/').collect::<Vec<_>>()[..] {
        [owner, name] if !owner.is_empty() && !name.is_empty() => (owner, name),
        _ => {
            tracing::trace!(path = %path, "Skipping trending block without a repo path");
            return None;
        }
    };

    let description = DESCRIPTION_RE
        .captures(block)
        .and_then(|cap| cap.get(1))
        .map(|m| collapse_whitespace(&decode_entities(&strip_tags(m.as_str()))))
        .filter(|d| !d.is_empty());

    let language = LANGUAGE_RE
        .captures(block)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|l| !l.is_empty());

    let stars_today = STARS_TODAY_RE
        .captures(block)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string());

    let stars = TOTAL_STARS_RE
        .captures(block)
        .and_then(|cap| cap.get(1))
        .and_then(|m| {
            let digits: String = strip_tags(m.as_str())
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',')
                .collect();
            digits.parse::<u64>().ok()
        });

    Some(TrendingRepo {
        owner: owner.to_string(),
        name: name.to_string(),
        description,
        language,
        stars,
        stars_today,
        fetched_at,
    })
}

#[derive(Debug, Clone)]
pub struct TrendingSettings {
    pub fetch: FetchConfig,
    /// Overridable for tests.
    pub base_url: String,
}

impl Default for TrendingSettings {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::listing(),
            base_url: TRENDING_BASE_URL.to_string(),
        }
    }
}

/// Fetches and parses the trending page.
///
/// # Errors
///
/// Returns [`FetchError`] when the page cannot be retrieved.
pub async fn try_fetch_trending(
    client: &reqwest::Client,
    settings: &TrendingSettings,
    language: Option<&str>,
    since: Since,
) -> Result<Vec<TrendingRepo>, FetchError> {
    let url = trending_url(&settings.base_url, language, since);
    let html = http::get_text(client, &url, &settings.fetch).await?;
    let repos = parse_trending_html(&html, Utc::now());
    if repos.is_empty() {
        tracing::warn!(url = %url, "No repositories found on trending page");
    }
    Ok(repos)
}

/// Like [`try_fetch_trending`], but a failed fetch yields an empty list and
/// a `warn` log.
pub async fn fetch_trending(
    client: &reqwest::Client,
    settings: &TrendingSettings,
    language: Option<&str>,
    since: Since,
) -> Vec<TrendingRepo> {
    match try_fetch_trending(client, settings, language, since).await {
        Ok(repos) => repos,
        Err(e) => {
            tracing::warn!(
                language = language.unwrap_or("all"),
                since = %since,
                error = %e,
                "Trending fetch failed"
            );
            Vec::new()
        }
    }
}
