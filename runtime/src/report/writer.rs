//! Writes reports and artifacts into a per-run directory.
//!
//! Layout: `<output_dir>/<hostname>_<YYYY-MM-DDTHH-MM-SS>/` holding
//! `report.json` and/or `report.md`, plus `pages/`, `screenshots/`,
//! `page.html` and `robots.txt` depending on what was captured.

use super::markdown::{render_page, render_single, render_site, sanitize_filename};
use super::types::{PageReport, SiteReport};
use crate::events::{EventBus, EventKind};
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which report files to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Md,
    #[default]
    Both,
}

impl ReportFormat {
    pub fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn writes_markdown(self) -> bool {
        matches!(self, Self::Md | Self::Both)
    }
}

/// A screenshot captured for the page at `index` (1-based).
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub index: usize,
    pub url: String,
    pub png: Vec<u8>,
}

/// Writes reports under one output root and announces each written report.
pub struct ReportWriter<'a> {
    output_dir: PathBuf,
    format: ReportFormat,
    events: &'a EventBus,
}

impl<'a> ReportWriter<'a> {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat, events: &'a EventBus) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            events,
        }
    }

    /// Create the directory for a run against `hostname`.
    pub fn create_run_dir(&self, hostname: &str) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y-%m-%dT%H-%M-%S");
        let dir = self.output_dir.join(format!("{hostname}_{stamp}"));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Persist a site report. Written paths are recorded in
    /// `report.artifacts` before the JSON report itself is serialized.
    pub fn write_site(
        &self,
        report: &mut SiteReport,
        screenshots: &[Screenshot],
        robots_raw: Option<&str>,
    ) -> Result<PathBuf> {
        let dir = self.create_run_dir(&report.site.hostname)?;
        report.artifacts.directory = Some(display(&dir));

        let pages_dir = dir.join("pages");
        std::fs::create_dir_all(&pages_dir)
            .with_context(|| format!("creating {}", pages_dir.display()))?;
        for (i, page) in report.pages.iter().enumerate() {
            let Some(extracted) = page.extracted.as_ref().filter(|_| page.is_success()) else {
                continue;
            };
            let name = extracted
                .meta
                .title
                .clone()
                .unwrap_or_else(|| format!("page_{}", i + 1));
            let path = pages_dir.join(format!("{}-{}.md", i + 1, sanitize_filename(&name)));
            write_file(&path, render_page(page).as_bytes())?;
            report.artifacts.page_paths.push(display(&path));
        }

        if !screenshots.is_empty() {
            let shots_dir = dir.join("screenshots");
            std::fs::create_dir_all(&shots_dir)
                .with_context(|| format!("creating {}", shots_dir.display()))?;
            for shot in screenshots {
                let name = match shot.url.rsplit('/').next() {
                    Some(last) if !last.is_empty() => last.to_string(),
                    _ => format!("page_{}", shot.index),
                };
                let path = shots_dir.join(format!("{}-{}.png", shot.index, sanitize_filename(&name)));
                write_file(&path, &shot.png)?;
                report.artifacts.screenshot_paths.push(display(&path));
            }
            self.announce(&shots_dir, "screenshots");
        }

        if let Some(raw) = robots_raw {
            let path = dir.join("robots.txt");
            write_file(&path, raw.as_bytes())?;
            report.artifacts.robots_path = Some(display(&path));
        }

        if self.format.writes_markdown() {
            let path = dir.join("report.md");
            write_file(&path, render_site(report).as_bytes())?;
            report.artifacts.markdown_path = Some(display(&path));
            self.announce(&path, "md");
        }

        if self.format.writes_json() {
            let path = dir.join("report.json");
            report.artifacts.json_path = Some(display(&path));
            let body = serde_json::to_string_pretty(report).context("serializing site report")?;
            if let Err(e) = write_file(&path, body.as_bytes()) {
                report.artifacts.json_path = None;
                return Err(e);
            }
            self.announce(&path, "json");
        }

        info!("site report written to {}", dir.display());
        Ok(dir)
    }

    /// Persist a single-page report with its optional captures.
    pub fn write_page(
        &self,
        report: &mut PageReport,
        hostname: &str,
        html: Option<&str>,
        screenshot: Option<&[u8]>,
        robots_raw: Option<&str>,
    ) -> Result<PathBuf> {
        let dir = self.create_run_dir(hostname)?;

        if let Some(html) = html {
            let path = dir.join("page.html");
            write_file(&path, html.as_bytes())?;
            report.artifacts.html_path = Some(display(&path));
        }

        if let Some(png) = screenshot {
            let path = dir.join("screenshot.png");
            write_file(&path, png)?;
            report.artifacts.screenshot_path = Some(display(&path));
        }

        if let Some(raw) = robots_raw {
            let path = dir.join("robots.txt");
            write_file(&path, raw.as_bytes())?;
            report.artifacts.robots_path = Some(display(&path));
        }

        if self.format.writes_markdown() {
            let path = dir.join("report.md");
            write_file(&path, render_single(report).as_bytes())?;
            report.artifacts.markdown_path = Some(display(&path));
            self.announce(&path, "md");
        }

        if self.format.writes_json() {
            let path = dir.join("report.json");
            report.artifacts.json_path = Some(display(&path));
            let body = serde_json::to_string_pretty(report).context("serializing page report")?;
            if let Err(e) = write_file(&path, body.as_bytes()) {
                report.artifacts.json_path = None;
                return Err(e);
            }
            self.announce(&path, "json");
        }

        info!("page report written to {}", dir.display());
        Ok(dir)
    }

    fn announce(&self, path: &Path, format: &str) {
        self.events.emit(
            EventKind::ReportGenerated,
            json!({ "path": display(path), "format": format }),
        );
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
