//! Shared HTTP plumbing: one [`FetchConfig`] per call site class, a bounded
//! body reader, and the error type every network call reports.
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::util::UrlValidationError;

/// Browser-like User-Agent. Some publishers serve stripped or blocked pages to
/// anything that does not look like a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Descriptive User-Agent for readable-content extraction.
pub const READER_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; feeddeck/0.1; +https://github.com/dhofheinz/feeddeck)";

pub const FEED_ACCEPT: &str =
    "application/xml, application/atom+xml, application/rss+xml, text/xml;q=0.9, */*;q=0.8";
pub const HTML_ACCEPT: &str = "text/html,application/xhtml+xml";

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_REDIRECTS: usize = 10;

/// Errors that can occur during a single HTTP fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request (including the body read) exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// URL failed validation before any request was made
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
}

/// Per-request settings shared by every outbound call of one kind.
///
/// Each network call site receives one of these instead of hard-coding its
/// own timeout and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: Option<String>,
    pub max_body_bytes: usize,
}

impl FetchConfig {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
            accept: None,
            max_body_bytes: MAX_BODY_SIZE,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Feed documents: 30s, browser UA, XML-first Accept.
    pub fn feed() -> Self {
        Self::new(Duration::from_secs(30), BROWSER_USER_AGENT).with_accept(FEED_ACCEPT)
    }

    /// Open Graph and image API lookups: 5s, browser UA.
    pub fn image() -> Self {
        Self::new(Duration::from_secs(5), BROWSER_USER_AGENT)
    }

    /// Article pages for readable extraction: 15s, descriptive UA.
    pub fn page() -> Self {
        Self {
            max_body_bytes: MAX_PAGE_SIZE,
            ..Self::new(Duration::from_secs(15), READER_USER_AGENT).with_accept(HTML_ACCEPT)
        }
    }

    /// Scraped HTML listings (trending page): 30s, browser UA.
    pub fn listing() -> Self {
        Self::new(Duration::from_secs(30), BROWSER_USER_AGENT).with_accept("text/html")
    }
}

/// Builds the client shared by all fetches. Redirects are followed.
pub fn build_client() -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// GETs `url` and returns the body as text (invalid UTF-8 replaced).
///
/// The timeout covers connecting, the response head, and the body read, so a
/// server that trickles bytes cannot hold the caller past `config.timeout`.
///
/// # Errors
///
/// - [`FetchError::Timeout`] when the whole exchange exceeds `config.timeout`
/// - [`FetchError::HttpStatus`] for any non-2xx response
/// - [`FetchError::ResponseTooLarge`] when the body exceeds `config.max_body_bytes`
/// - [`FetchError::Network`] for transport failures
pub async fn get_text(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
) -> Result<String, FetchError> {
    let bytes = get_bytes(client, url, config).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// GETs `url` and returns the raw body. See [`get_text`] for error semantics.
pub async fn get_bytes(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(config.timeout, fetch_body(client, url, config))
        .await
        .map_err(|_| FetchError::Timeout(config.timeout))?
}

async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
) -> Result<Vec<u8>, FetchError> {
    let mut request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, config.user_agent.as_str());
    if let Some(accept) = &config.accept {
        request = request.header(reqwest::header::ACCEPT, accept.as_str());
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, config.max_body_bytes).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
