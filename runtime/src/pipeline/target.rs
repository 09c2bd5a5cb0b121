//! Audit target resolution.

use crate::error::{AuditError, Result};
use serde::Serialize;
use url::Url;

/// A validated audit target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// What the caller passed in.
    pub input: String,
    /// Absolute URL, `https://` prepended when the input had no scheme.
    pub url: String,
    /// `scheme://host[:port]`
    pub origin: String,
    /// `host[:port]`
    pub hostname: String,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AuditError::invalid_url(input, "empty URL"));
        }

        let url = if has_scheme(trimmed) {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let parsed = Url::parse(&url).map_err(|e| AuditError::invalid_url(input, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuditError::invalid_url(
                input,
                format!("unsupported scheme {}", parsed.scheme()),
            ));
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AuditError::invalid_url(input, "missing host"))?;

        let hostname = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            input: input.to_string(),
            origin: format!("{}://{hostname}", parsed.scheme()),
            hostname,
            url,
        })
    }

    pub fn robots_url(&self) -> String {
        format!("{}/robots.txt", self.origin)
    }

    pub fn default_sitemap_url(&self) -> String {
        format!("{}/sitemap.xml", self.origin)
    }
}

/// True when `input` starts with `scheme://`. A `://` later in the
/// path or query does not count.
fn has_scheme(input: &str) -> bool {
    input.split_once("://").is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_prepended() {
        let t = Target::parse("example.com").unwrap();
        assert_eq!(t.input, "example.com");
        assert_eq!(t.url, "https://example.com");
        assert_eq!(t.origin, "https://example.com");
        assert_eq!(t.hostname, "example.com");
        assert_eq!(t.robots_url(), "https://example.com/robots.txt");
        assert_eq!(t.default_sitemap_url(), "https://example.com/sitemap.xml");

        let t = Target::parse("example.com/login?next=https://example.com/home").unwrap();
        assert_eq!(t.url, "https://example.com/login?next=https://example.com/home");
        assert_eq!(t.hostname, "example.com");

        let t = Target::parse("example.com:8080/a").unwrap();
        assert_eq!(t.url, "https://example.com:8080/a");
        assert_eq!(t.hostname, "example.com:8080");
    }

    #[test]
    fn test_port_is_kept() {
        let t = Target::parse("http://127.0.0.1:8080/docs?q=1").unwrap();
        assert_eq!(t.url, "http://127.0.0.1:8080/docs?q=1");
        assert_eq!(t.origin, "http://127.0.0.1:8080");
        assert_eq!(t.hostname, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_targets() {
        for bad in ["", "   ", "https://", "ftp://example.com/file", "http://exa mple.com"] {
            let err = Target::parse(bad).unwrap_err();
            assert!(matches!(err, AuditError::InvalidUrl { .. }), "{bad:?} gave {err}");
        }
    }
}
