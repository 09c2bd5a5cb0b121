//! CLI subcommand implementations for the `webaudit` binary.

pub mod crawl_cmd;
pub mod output;
pub mod progress;
pub mod robots_cmd;
pub mod visit_cmd;

use crate::audit::EventLog;
use crate::events::EventBus;
use crate::pipeline::AuditConfig;
use crate::report::ReportFormat;
use anyhow::{anyhow, Result};
use clap::Args;
use progress::AuditProgress;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags shared by `visit` and `crawl`. Unset flags keep the value from
/// `--config` (or the built-in default).
#[derive(Debug, Clone, Default, Args)]
pub struct AuditArgs {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Do not write any report files
    #[arg(long, conflicts_with = "output")]
    pub no_output: bool,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Ignore robots.txt restrictions
    #[arg(long)]
    pub no_robots: bool,

    /// Treat an unreadable robots.txt as disallowing everything
    #[arg(long)]
    pub robots_fail_closed: bool,

    /// Navigation timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// User agent for every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Save page screenshots (when the fetcher supports them)
    #[arg(long)]
    pub save_screenshot: bool,

    /// Save the raw HTML of the page
    #[arg(long)]
    pub save_html: bool,

    /// Save the robots.txt document
    #[arg(long)]
    pub save_robots: bool,

    /// Save every optional artifact
    #[arg(long)]
    pub save_all: bool,

    /// Append every pipeline event as JSON lines to this file
    #[arg(long, value_name = "FILE")]
    pub event_log: Option<PathBuf>,
}

impl AuditArgs {
    /// Layer the flags over the config file (or defaults).
    pub fn to_config(&self) -> Result<AuditConfig> {
        let mut config = match &self.config {
            Some(path) => AuditConfig::from_file(path)?,
            None => AuditConfig::default(),
        };

        if self.no_output {
            config.output_dir = None;
        } else if let Some(dir) = &self.output {
            config.output_dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_robots {
            config.respect_robots = false;
        }
        if self.robots_fail_closed {
            config.robots_fail_closed = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(agent) = &self.user_agent {
            config.user_agent = agent.clone();
        }
        config.save_screenshot |= self.save_screenshot;
        config.save_html |= self.save_html;
        config.save_robots |= self.save_robots;
        if self.save_all {
            config = config.save_all();
        }

        config.validate().map_err(|e| anyhow!("invalid options: {e}"))?;
        Ok(config)
    }

    /// Subscribe the event log and, unless output is quiet or JSON, a
    /// progress display. The returned handle is cleared when the run ends.
    pub fn attach_observers(&self, events: &mut EventBus) -> Result<Option<Arc<AuditProgress>>> {
        if let Some(path) = &self.event_log {
            events.subscribe_all(Arc::new(EventLog::open(path)?));
        }
        if output::is_quiet() || output::is_json() {
            return Ok(None);
        }
        let progress = Arc::new(AuditProgress::new());
        events.subscribe_all(progress.clone());
        Ok(Some(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CrawlMode;
    use std::io::Write;

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"crawl_mode": "sitemap", "timeout": 5000, "format": "json", "save_html": true}}"#
        )
        .unwrap();

        let args = AuditArgs {
            config: Some(file.path().to_path_buf()),
            timeout: Some(9000),
            no_robots: true,
            save_robots: true,
            ..Default::default()
        };
        let config = args.to_config().unwrap();

        assert_eq!(config.crawl_mode, CrawlMode::Sitemap);
        assert_eq!(config.timeout, 9000);
        assert_eq!(config.format, ReportFormat::Json);
        assert!(!config.respect_robots);
        assert!(config.save_html && config.save_robots && !config.save_screenshot);
    }

    #[test]
    fn test_no_output_and_save_all() {
        let args = AuditArgs {
            no_output: true,
            save_all: true,
            ..Default::default()
        };
        let config = args.to_config().unwrap();
        assert!(config.output_dir.is_none());
        assert!(config.save_html && config.save_screenshot && config.save_robots);
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        let args = AuditArgs {
            user_agent: Some("  ".into()),
            ..Default::default()
        };
        assert!(args.to_config().is_err());
    }
}
