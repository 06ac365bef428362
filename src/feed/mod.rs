//! Feed normalization pipeline.
//!
//! Raw bytes go through four stages, each in its own submodule:
//!
//! - [`xml`] - generic element tree over `quick-xml`
//! - [`dialect`] - RSS 2.0 / RDF / Atom detection
//! - [`parser`] - per-item field extraction into [`Article`](crate::article::Article)s
//! - [`image`] and [`remote`] - the image resolution chain, in-document first,
//!   network lookups last
//!
//! [`fetch_feed`] ties them together behind one HTTP fetch.

pub mod dialect;
mod fetcher;
pub mod image;
pub mod parser;
pub mod remote;
pub mod xml;

pub use dialect::Dialect;
pub use fetcher::{fetch_feed, try_fetch_feed, FeedError, FeedSettings};
pub use parser::{parse_feed, ParseResult, ParsedItem};
pub use remote::RemoteImageConfig;
