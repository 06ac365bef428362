//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Security-focused validation to prevent SSRF attacks
//! - **Text processing**: tag stripping, entity decoding and character truncation
//!   for feed summaries and scraped descriptions
//!
//! # Examples
//!
//! ```
//! use feeddeck::util::{html_to_plain, truncate_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! let text = html_to_plain("<p>Hello&nbsp;world</p>");
//! assert_eq!(truncate_chars(&text, 5), "Hello...");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, decode_entities, html_to_plain, strip_tags, truncate_chars};
pub use url_validator::{validate_url, UrlPolicy, UrlValidationError};
