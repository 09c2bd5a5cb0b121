//! Audit configuration.

use crate::error::{AuditError, Result};
use crate::report::ReportFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "WebAuditBot/1.0 (+https://github.com/web-audit)";

/// How the site audit finds pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Only the target URL.
    #[default]
    Single,
    /// Every URL reachable from the site's sitemaps.
    Sitemap,
}

/// Options shared by site and single-page audits. Missing fields take
/// their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub respect_robots: bool,
    pub max_pages: usize,
    pub crawl_mode: CrawlMode,
    /// Seconds between pages when robots.txt declares no crawl delay.
    pub crawl_delay: f64,
    /// Page navigation timeout in milliseconds.
    pub timeout: u64,
    pub user_agent: String,
    pub save_screenshot: bool,
    pub save_html: bool,
    pub save_robots: bool,
    /// Root for report directories. `None` skips persistence.
    pub output_dir: Option<PathBuf>,
    pub format: ReportFormat,
    /// Timeout for robots.txt and sitemap requests, in milliseconds.
    pub robots_timeout_ms: u64,
    /// Block every page when robots.txt could not be fetched (a 404 still
    /// counts as "no policy").
    pub robots_fail_closed: bool,
    /// Pages fetched at once. 1 crawls strictly in sequence.
    pub concurrency: usize,
    /// Driver name announced in navigation events. Defaults to the
    /// fetcher's own name.
    pub driver: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            respect_robots: true,
            max_pages: 20,
            crawl_mode: CrawlMode::Single,
            crawl_delay: 1.0,
            timeout: 30_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            save_screenshot: false,
            save_html: false,
            save_robots: false,
            output_dir: Some(PathBuf::from("./reports")),
            format: ReportFormat::Both,
            robots_timeout_ms: 10_000,
            robots_fail_closed: false,
            concurrency: 1,
            driver: None,
        }
    }
}

impl AuditConfig {
    /// Load from a JSON file. Fields absent from the file keep defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_err = |message: String| AuditError::Config {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))?;
        config.validate().map_err(config_err)?;
        Ok(config)
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.crawl_delay.is_finite() || self.crawl_delay < 0.0 {
            return Err(format!("crawl_delay must be a non-negative number, got {}", self.crawl_delay));
        }
        if self.max_pages == 0 {
            return Err("max_pages must be at least 1".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }
        Ok(())
    }

    /// Worker count, never below one.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Save every optional artifact.
    pub fn save_all(mut self) -> Self {
        self.save_html = true;
        self.save_screenshot = true;
        self.save_robots = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert!(config.respect_robots);
        assert_eq!(config.max_pages, 20);
        assert_eq!(config.crawl_mode, CrawlMode::Single);
        assert_eq!(config.crawl_delay, 1.0);
        assert_eq!(config.timeout, 30_000);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.format, ReportFormat::Both);
        assert_eq!(config.output_dir, Some(PathBuf::from("./reports")));
        assert!(!config.save_html && !config.save_screenshot && !config.save_robots);
        assert_eq!(config.workers(), 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AuditConfig =
            serde_json::from_str(r#"{"crawl_mode": "sitemap", "max_pages": 5, "output_dir": null}"#)
                .unwrap();
        assert_eq!(config.crawl_mode, CrawlMode::Sitemap);
        assert_eq!(config.max_pages, 5);
        assert!(config.output_dir.is_none());
        assert_eq!(config.timeout, 30_000);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"format": "md", "concurrency": 0, "respect_robots": false}}"#).unwrap();
        let config = AuditConfig::from_file(file.path()).unwrap();
        assert_eq!(config.format, ReportFormat::Md);
        assert!(!config.respect_robots);
        assert_eq!(config.workers(), 1);
    }

    #[test]
    fn test_from_file_rejects_bad_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"crawl_mode": "everything"}}"#).unwrap();
        let err = AuditConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AuditError::Config { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"crawl_delay": -2}}"#).unwrap();
        assert!(AuditConfig::from_file(file.path()).is_err());

        let missing = AuditConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_save_all() {
        let config = AuditConfig::default().save_all();
        assert!(config.save_html && config.save_screenshot && config.save_robots);
    }
}
