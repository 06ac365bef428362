use chrono::{NaiveDate, Utc};
use dom_smoothie::{Config, Readability};

use super::markdown::html_to_markdown;
use super::{ExtractError, ExtractedDocument};
use crate::http::{self, FetchConfig};
use crate::util::UrlPolicy;

/// Title used when neither the caller nor the page provides one.
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub fetch: FetchConfig,
    pub policy: UrlPolicy,
}

impl ExtractSettings {
    pub fn new(fetch: FetchConfig, policy: UrlPolicy) -> Self {
        Self { fetch, policy }
    }
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self::new(FetchConfig::page(), UrlPolicy::default())
    }
}

/// Fetches `url`, isolates its main content and renders it as Markdown.
///
/// `title` overrides whatever title the page declares.
///
/// # Errors
///
/// - [`ExtractError::BadRequest`] for a blank URL or one the policy rejects
/// - [`ExtractError::FetchFailed`] for a non-2xx response
/// - [`ExtractError::Network`] / [`ExtractError::Timeout`] for transport failures
/// - [`ExtractError::NotExtractable`] when no readable text is found
/// - [`ExtractError::Unexpected`] for anything else
pub async fn extract(
    client: &reqwest::Client,
    settings: &ExtractSettings,
    url: &str,
    title: Option<&str>,
) -> Result<ExtractedDocument, ExtractError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ExtractError::BadRequest("URL is required".to_string()));
    }
    settings
        .policy
        .check(url)
        .map_err(|e| ExtractError::BadRequest(e.to_string()))?;

    let html = http::get_text(client, url, &settings.fetch).await?;
    let (page_title, content) = readable_html(&html, url)?;

    let body = html_to_markdown(&content);
    if body.trim().is_empty() {
        return Err(ExtractError::NotExtractable);
    }

    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| Some(page_title.trim()).filter(|t| !t.is_empty()))
        .unwrap_or(UNTITLED)
        .to_string();

    tracing::debug!(url = %url, title = %title, chars = body.len(), "Article extracted");

    let markdown = compose_markdown(&title, url, Utc::now().date_naive(), &body);
    Ok(ExtractedDocument { title, markdown })
}

/// Runs readability over the page. Returns the page title and content HTML.
fn readable_html(html: &str, url: &str) -> Result<(String, String), ExtractError> {
    if html.trim().is_empty() {
        return Err(ExtractError::NotExtractable);
    }

    let config = Config {
        max_elements_to_parse: usize::MAX,
        ..Default::default()
    };
    let mut readability = Readability::new(html, Some(url), Some(config))
        .map_err(|e| ExtractError::Unexpected(e.to_string()))?;

    let article = match readability.parse() {
        Ok(article) => article,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Readability found no article");
            return Err(ExtractError::NotExtractable);
        }
    };

    if article.text_content.trim().is_empty() {
        return Err(ExtractError::NotExtractable);
    }

    Ok((article.title, article.content.to_string()))
}

/// Assembles the clipped document: frontmatter, heading, source line, body.
pub fn compose_markdown(title: &str, url: &str, clipped: NaiveDate, body: &str) -> String {
    [
        "---".to_string(),
        format!("title: \"{}\"", title.replace('"', "\\\"")),
        format!("source: \"{}\"", url),
        format!("clipped: {}", clipped.format("%Y-%m-%d")),
        "---".to_string(),
        String::new(),
        format!("# {}", title),
        String::new(),
        format!("> Source: [{}]({})", title, url),
        String::new(),
        body.to_string(),
    ]
    .join("\n")
}
