//! Terminal progress for audit runs, driven by pipeline events.
//!
//! Uses `indicatif`: a spinner while robots.txt and sitemaps are fetched,
//! then a bar over the pages being crawled.

use crate::events::{Event, EventKind, Observer};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const TICKS: &str = "\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg}")
        .map(|s| s.tick_chars(TICKS))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.blue} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}")
        .map(|s| s.tick_chars(TICKS).progress_chars("\u{2588}\u{2589}\u{2591}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Renders pipeline events on stderr.
pub struct AuditProgress {
    bar: ProgressBar,
}

impl Default for AuditProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// A progress display that draws nothing.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn handle(&self, event: &Event) {
        let data = &event.data;
        match event.kind {
            EventKind::PipelineStart => {
                self.bar.set_message(format!("Auditing {}", str_field(data, "url")));
            }
            EventKind::RobotsFetch => {
                self.bar.set_message(format!("Fetching {}", str_field(data, "url")));
            }
            EventKind::RobotsResult => {
                let delay = data["crawl_delay"]
                    .as_f64()
                    .map(|d| format!(", crawl-delay {d}s"))
                    .unwrap_or_default();
                self.bar.println(format!(
                    "  robots.txt: {} sitemap(s){delay}",
                    data["sitemap_count"].as_u64().unwrap_or(0)
                ));
            }
            EventKind::ExtractStart if data["extractors"][0] == "sitemap" => {
                self.bar.set_message("Discovering sitemap URLs");
            }
            EventKind::ExtractPartial => self.on_partial(data),
            EventKind::NavigateComplete => {
                let status = data["status"].as_u64().unwrap_or(0);
                self.bar.set_message(format!(
                    "{} {}",
                    status_label(status),
                    str_field(data, "final_url")
                ));
            }
            EventKind::Error => {
                self.bar.println(format!("  error: {}", str_field(data, "message")));
            }
            EventKind::ReportGenerated => {
                self.bar.println(format!(
                    "  wrote {} ({})",
                    str_field(data, "path"),
                    str_field(data, "format")
                ));
            }
            EventKind::PipelineEnd => self.finish(),
            _ => {}
        }
    }

    fn on_partial(&self, data: &serde_json::Value) {
        let detail = &data["data"];
        match data["extractor_name"].as_str() {
            Some("sitemap") => {
                self.bar.println(format!(
                    "  sitemap: {} URL(s) discovered",
                    detail["urls_found"].as_u64().unwrap_or(0)
                ));
            }
            Some("page") => {
                let total = detail["total"].as_u64().unwrap_or(0);
                let current = detail["current"].as_u64().unwrap_or(0);
                if self.bar.length() != Some(total) {
                    self.bar.set_style(bar_style());
                    self.bar.set_length(total);
                }
                self.bar.set_position(current.saturating_sub(1));
                self.bar.set_message(str_field(detail, "url").to_string());
            }
            _ => {}
        }
    }
}

impl Observer for AuditProgress {
    fn notify(&self, event: &Event) -> anyhow::Result<()> {
        self.handle(event);
        Ok(())
    }
}

fn str_field<'a>(data: &'a serde_json::Value, key: &str) -> &'a str {
    data[key].as_str().unwrap_or("")
}

fn status_label(status: u64) -> String {
    if status == 0 {
        "failed".to_string()
    } else {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_events_drive_the_bar() {
        let progress = AuditProgress::hidden();
        for current in 1..=3 {
            progress
                .notify(&Event::new(
                    EventKind::ExtractPartial,
                    json!({
                        "extractor_name": "page",
                        "data": { "current": current, "total": 3, "url": "https://example.com/" },
                    }),
                ))
                .unwrap();
        }
        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.position(), 2);

        progress
            .notify(&Event::new(EventKind::PipelineEnd, json!({})))
            .unwrap();
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(0), "failed");
        assert_eq!(status_label(404), "404");
    }
}
