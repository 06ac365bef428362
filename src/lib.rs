//! Feed normalization, image enrichment and readable-content extraction for
//! multi-column news decks.
//!
//! Entry points:
//!
//! - [`feed::fetch_feed`] - any RSS 2.0 / RSS 1.0 / Atom feed to [`Article`]s
//! - [`news::fetch_news`] - keyword search through the news aggregator feed
//! - [`trending::fetch_trending`] - GitHub trending repositories
//! - [`content::extract`] - an article page to a clipped Markdown document
//! - [`columns::refresh_columns`] - every configured column at once

pub mod article;
pub mod columns;
pub mod config;
pub mod content;
pub mod feed;
pub mod http;
pub mod news;
pub mod trending;
pub mod util;

pub use article::Article;
