use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which hosts outbound fetches may target.
///
/// Feed, page and article URLs all come from user configuration or from
/// third-party feed content, so by default they are held to the same rules:
/// http(s) only, no loopback, no private ranges. Tests and self-hosted setups
/// that fetch from LAN services flip `allow_private_hosts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    /// Policy that only enforces the scheme and host checks.
    pub const PERMISSIVE: UrlPolicy = UrlPolicy {
        allow_private_hosts: true,
    };

    /// Validates `url_str` under this policy, returning the parsed [`Url`].
    pub fn check(&self, url_str: &str) -> Result<Url, UrlValidationError> {
        if self.allow_private_hosts {
            let url = Url::parse(url_str)?;
            check_scheme_and_host(&url)?;
            Ok(url)
        } else {
            validate_url(url_str)
        }
    }
}

/// Validates a URL string for use as a fetch target.
///
/// Performs security-focused validation to prevent SSRF attacks by rejecting:
/// - Non-HTTP(S) schemes (e.g., `file://`, `ftp://`)
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is not `http` or `https` ([`UrlValidationError::UnsupportedScheme`])
/// - The host is localhost ([`UrlValidationError::Localhost`])
/// - The host is a private IP address ([`UrlValidationError::PrivateIp`])
///
/// # Examples
///
/// ```
/// use feeddeck::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    let host = check_scheme_and_host(&url)?;

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn check_scheme_and_host(url: &Url) -> Result<&str, UrlValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    url.host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlValidationError::MissingHost)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_and_article_urls_pass() {
        for url in [
            "https://zenn.dev/feed",
            "http://b.hatena.ne.jp/hotentry/it.rss",
            "https://news.google.com/rss/search?q=rust",
        ] {
            assert!(validate_url(url).is_ok(), "{url} should be allowed");
        }
    }

    #[test]
    fn test_rejections() {
        let cases = [
            ("file:///etc/passwd", "scheme"),
            ("ftp://example.com/feed", "scheme"),
            ("http://localhost/feed", "localhost"),
            ("http://127.0.0.1/feed", "localhost"),
            ("http://[::1]/feed", "localhost"),
            ("http://192.168.1.1/feed", "private"),
            ("http://10.0.0.1/feed", "private"),
            ("http://172.16.0.1/feed", "private"),
            ("http://169.254.1.1/feed", "private"),
            ("http://[fe80::1]/feed", "private"),
            ("http://[fd00::1]/feed", "private"),
            ("http://0.0.0.0/feed", "private"),
            ("not a url", "parse"),
        ];
        for (url, kind) in cases {
            let err = validate_url(url).expect_err(url);
            let matched = match kind {
                "scheme" => matches!(err, UrlValidationError::UnsupportedScheme(_)),
                "localhost" => matches!(err, UrlValidationError::Localhost),
                "private" => matches!(err, UrlValidationError::PrivateIp(_)),
                _ => matches!(err, UrlValidationError::InvalidUrl(_)),
            };
            assert!(matched, "{url}: unexpected error {err:?}");
        }
    }

    #[test]
    fn test_permissive_policy_allows_loopback() {
        let url = UrlPolicy::PERMISSIVE.check("http://127.0.0.1:8080/feed").unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_permissive_policy_still_checks_scheme() {
        assert!(matches!(
            UrlPolicy::PERMISSIVE.check("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_default_policy_is_strict() {
        assert!(UrlPolicy::default().check("http://10.0.0.1/").is_err());
        assert!(UrlPolicy::default().check("https://example.com/").is_ok());
    }
}
