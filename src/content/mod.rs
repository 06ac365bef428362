//! Readable-content extraction: article URL in, Markdown document out.

pub mod markdown;
mod readable;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::http::FetchError;

pub use readable::{compose_markdown, extract, ExtractSettings, UNTITLED};

/// A clipped article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedDocument {
    pub title: String,
    /// Frontmatter, heading, source line and converted body.
    pub markdown: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Failed to fetch article (HTTP {status})")]
    FetchFailed { status: u16 },
    #[error("Failed to fetch article: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Fetching the article timed out after {0:?}")]
    Timeout(Duration),
    #[error("No readable content could be extracted from this article")]
    NotExtractable,
    #[error("Extraction failed: {0}")]
    Unexpected(String),
}

impl ExtractError {
    /// HTTP-style status class of the failure.
    pub fn status(&self) -> u16 {
        match self {
            ExtractError::BadRequest(_) => 400,
            ExtractError::FetchFailed { .. }
            | ExtractError::Network(_)
            | ExtractError::Timeout(_) => 502,
            ExtractError::NotExtractable => 422,
            ExtractError::Unexpected(_) => 500,
        }
    }
}

impl From<FetchError> for ExtractError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::HttpStatus(status) => ExtractError::FetchFailed { status },
            FetchError::Network(e) => ExtractError::Network(e),
            FetchError::Timeout(after) => ExtractError::Timeout(after),
            FetchError::InvalidUrl(e) => ExtractError::BadRequest(e.to_string()),
            FetchError::ResponseTooLarge => ExtractError::Unexpected(e.to_string()),
        }
    }
}
