//! Configuration file parser for ~/.config/feeddeck/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::columns::{Column, SourceSettings};
use crate::content::ExtractSettings;
use crate::feed::remote::DEFAULT_MAX_LOOKUPS;
use crate::feed::{FeedSettings, RemoteImageConfig};
use crate::http::{self, FetchConfig};
use crate::news::{NewsLocale, NewsSettings};
use crate::trending::TrendingSettings;
use crate::util::UrlPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User-Agent for feed, trending and Open Graph requests.
    pub browser_user_agent: String,

    /// User-Agent for readable-content extraction.
    pub reader_user_agent: String,

    pub feed_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub page_timeout_secs: u64,

    /// Remote image lookups per feed fetch, capped at 10. 0 disables them.
    pub max_image_lookups: usize,

    /// Permit fetching loopback and private-network URLs.
    pub allow_private_hosts: bool,

    /// `hl` parameter of keyword news searches.
    pub news_language: String,

    /// `gl` parameter of keyword news searches.
    pub news_region: String,

    pub columns: Vec<Column>,
}

impl Default for Config {
    fn default() -> Self {
        let locale = NewsLocale::default();
        Self {
            browser_user_agent: http::BROWSER_USER_AGENT.to_string(),
            reader_user_agent: http::READER_USER_AGENT.to_string(),
            feed_timeout_secs: 30,
            image_timeout_secs: 5,
            page_timeout_secs: 15,
            max_image_lookups: DEFAULT_MAX_LOOKUPS,
            allow_private_hosts: false,
            news_language: locale.language,
            news_region: locale.region,
            columns: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "browser_user_agent",
        "reader_user_agent",
        "feed_timeout_secs",
        "image_timeout_secs",
        "page_timeout_secs",
        "max_image_lookups",
        "allow_private_hosts",
        "news_language",
        "news_region",
        "columns",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            columns = config.columns.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn url_policy(&self) -> UrlPolicy {
        UrlPolicy {
            allow_private_hosts: self.allow_private_hosts,
        }
    }

    pub fn feed_fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.feed_timeout_secs),
            user_agent: self.browser_user_agent.clone(),
            ..FetchConfig::feed()
        }
    }

    pub fn image_fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.image_timeout_secs),
            user_agent: self.browser_user_agent.clone(),
            ..FetchConfig::image()
        }
    }

    pub fn page_fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.page_timeout_secs),
            user_agent: self.reader_user_agent.clone(),
            ..FetchConfig::page()
        }
    }

    pub fn listing_fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.feed_timeout_secs),
            user_agent: self.browser_user_agent.clone(),
            ..FetchConfig::listing()
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        let defaults = RemoteImageConfig::default();
        FeedSettings {
            fetch: self.feed_fetch(),
            images: RemoteImageConfig {
                page_fetch: self.image_fetch(),
                api_fetch: FetchConfig {
                    timeout: Duration::from_secs(self.image_timeout_secs),
                    ..defaults.api_fetch.clone()
                },
                max_lookups: self.max_image_lookups.min(DEFAULT_MAX_LOOKUPS),
                policy: self.url_policy(),
                ..defaults
            },
            policy: self.url_policy(),
        }
    }

    pub fn news_settings(&self) -> NewsSettings {
        NewsSettings {
            locale: NewsLocale {
                language: self.news_language.clone(),
                region: self.news_region.clone(),
            },
            ..NewsSettings::default()
        }
    }

    pub fn trending_settings(&self) -> TrendingSettings {
        TrendingSettings {
            fetch: self.listing_fetch(),
            ..TrendingSettings::default()
        }
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            feed: self.feed_settings(),
            news: self.news_settings(),
            trending: self.trending_settings(),
        }
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings::new(self.page_fetch(), self.url_policy())
    }
}

// ============================================================================
// Tests
// ============================================================================
