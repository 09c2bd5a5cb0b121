//! `webaudit crawl <url>`: audit a whole site.

use crate::cli::output::{self, Styled};
use crate::cli::visit_cmd::print_issues;
use crate::cli::AuditArgs;
use crate::pipeline::{CrawlMode, SiteAudit};
use crate::report::SiteReport;
use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

#[derive(Debug, Clone, Default, Args)]
pub struct CrawlArgs {
    /// Page discovery strategy
    #[arg(short, long, value_enum)]
    pub mode: Option<CrawlMode>,

    /// Maximum number of pages to crawl
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Seconds between pages when robots.txt sets no crawl delay
    #[arg(long, value_name = "SECS")]
    pub delay: Option<f64>,

    /// Pages fetched at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub audit: AuditArgs,
}

/// Run the crawl command. Ctrl-C stops the crawl after the page in flight.
pub async fn run(url: &str, args: &CrawlArgs) -> Result<()> {
    let s = Styled::new();
    let mut config = args.audit.to_config()?;
    if let Some(mode) = args.mode {
        config.crawl_mode = mode;
    }
    if let Some(max) = args.max_pages {
        config.max_pages = max;
    }
    if let Some(delay) = args.delay {
        config.crawl_delay = delay;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    config.validate().map_err(|e| anyhow!("invalid options: {e}"))?;

    if !output::is_quiet() && !output::is_json() {
        output::print_header(&s, url);
        let mode = match config.crawl_mode {
            CrawlMode::Single => "single page".to_string(),
            CrawlMode::Sitemap => format!("sitemap (up to {} pages)", config.max_pages),
        };
        output::print_check(s.ok_sym(), "Mode", &mode);
        output::print_check(s.ok_sym(), "Delay", &format!("{}s", config.crawl_delay));
        eprintln!();
    }

    let mut audit = SiteAudit::new(config);
    let progress = args.audit.attach_observers(audit.events_mut())?;

    let stop = audit.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, stopping after the current page");
            stop.stop();
        }
    });

    let report = audit.run(url).await;
    if let Some(progress) = progress {
        progress.finish();
    }
    let report = report?;

    if output::is_json() {
        return output::print_json(&report);
    }
    if !output::is_quiet() {
        print_summary(&s, &report);
    }
    Ok(())
}

/// Share of title, description and h1 signals present across successful
/// pages.
pub fn seo_score(report: &SiteReport) -> usize {
    let s = &report.summary;
    let found = s.seo.pages_with_title + s.seo.pages_with_description + s.seo.pages_with_h1;
    output::percent(found, s.successful_pages * 3)
}

fn print_summary(s: &Styled, report: &SiteReport) {
    let summary = &report.summary;
    let score = seo_score(report);
    let score_sym = match score {
        80.. => s.ok_sym(),
        50..=79 => s.warn_sym(),
        _ => s.fail_sym(),
    };

    output::print_section(s, "Overview");
    output::print_check(s.ok_sym(), "Site", &report.site.hostname);
    output::print_check(s.ok_sym(), "Pages analyzed", &summary.total_pages.to_string());
    output::print_check(
        s.ok_sym(),
        "Successful",
        &format!(
            "{} ({}%)",
            s.green(&summary.successful_pages.to_string()),
            output::percent(summary.successful_pages, summary.total_pages)
        ),
    );
    output::print_check(s.ok_sym(), "Blocked", &summary.blocked_pages.to_string());
    let error_sym = if summary.error_pages > 0 { s.fail_sym() } else { s.ok_sym() };
    output::print_check(error_sym, "Errors", &summary.error_pages.to_string());
    output::print_check(score_sym, "SEO score", &format!("{score}%"));
    output::print_check(
        s.ok_sym(),
        "Avg load time",
        &output::format_millis(summary.performance.avg_load_time_ms),
    );

    let total = summary.successful_pages.max(1);
    output::print_section(s, "SEO health");
    for (label, count) in [
        ("Title tags", summary.seo.pages_with_title),
        ("Descriptions", summary.seo.pages_with_description),
        ("H1 headings", summary.seo.pages_with_h1),
        ("OpenGraph", summary.seo.pages_with_opengraph),
        ("JSON-LD", summary.seo.pages_with_jsonld),
    ] {
        let sym = if count == total { s.ok_sym() } else { s.warn_sym() };
        output::print_check(sym, label, &format!("{count}/{total}"));
    }

    output::print_section(s, "Content");
    output::print_check(
        s.ok_sym(),
        "Internal links",
        &format!(
            "{} (avg {}/page)",
            summary.content.total_internal_links, summary.content.avg_internal_links_per_page
        ),
    );
    output::print_check(
        s.ok_sym(),
        "External links",
        &format!(
            "{} (avg {}/page)",
            summary.content.total_external_links, summary.content.avg_external_links_per_page
        ),
    );

    print_issues(s, &report.errors, &report.warnings);

    if let Some(dir) = &report.artifacts.directory {
        output::print_section(s, "Artifacts");
        output::print_check(s.ok_sym(), "Directory", dir);
        if output::is_verbose() {
            for path in &report.artifacts.page_paths {
                eprintln!("      {}", s.dim(path));
            }
        }
    }

    eprintln!();
    let title = if report.interrupted {
        s.yellow("Site audit interrupted")
    } else {
        s.bold("Site audit complete")
    };
    eprintln!("  {title} ({})", output::format_millis(report.duration.total_ms));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartography::robots::RobotsPolicy;
    use crate::report::{SiteReport, SiteSummary};

    fn report(successful: usize, title: usize, description: usize, h1: usize) -> SiteReport {
        let mut summary = SiteSummary {
            total_pages: successful,
            successful_pages: successful,
            ..Default::default()
        };
        summary.seo.pages_with_title = title;
        summary.seo.pages_with_description = description;
        summary.seo.pages_with_h1 = h1;

        let report = serde_json::json!({
            "version": "1.0.0",
            "timestamp": "2026-01-01T00:00:00Z",
            "site": { "input_url": "example.com", "origin": "https://example.com", "hostname": "example.com" },
            "robots": RobotsPolicy::from_raw("https://example.com/robots.txt", "", "https://example.com/", "bot"),
            "sitemap": { "discovered": true, "total_urls": successful, "sitemap_urls": [] },
            "pages": [],
            "summary": summary,
            "duration": { "total_ms": 0, "robots_ms": 0, "sitemap_ms": 0, "crawl_ms": 0 },
            "errors": [],
            "warnings": [],
        });
        serde_json::from_value(report).unwrap()
    }

    #[test]
    fn test_seo_score() {
        assert_eq!(seo_score(&report(2, 2, 2, 2)), 100);
        assert_eq!(seo_score(&report(2, 2, 1, 0)), 50);
        assert_eq!(seo_score(&report(0, 0, 0, 0)), 0);
    }
}
