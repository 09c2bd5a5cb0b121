//! Errors that escape an audit run.
//!
//! Everything after URL validation is recovered into the report, so this
//! enum only covers setup failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The target could not be turned into an absolute http(s) URL.
    #[error("Invalid URL: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client used for robots.txt and sitemaps could not be built.
    #[error("Audit setup failed: {0}")]
    Setup(String),

    /// A configuration file could not be read or parsed.
    #[error("Invalid configuration {path}: {message}")]
    Config { path: String, message: String },
}

impl AuditError {
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        AuditError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
