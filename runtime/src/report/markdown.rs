//! Markdown rendering of audit reports.

use super::types::{PageReport, PageResult, SiteReport};
use crate::extraction::ExtractedPage;

const HR: &str = "---";
const MAX_FILENAME_CHARS: usize = 50;

/// Combined report for a site audit.
pub fn render_site(report: &SiteReport) -> String {
    let s = &report.summary;
    let mut lines = vec![
        "# Website Content Report".to_string(),
        String::new(),
        format!("> **{}**", report.site.hostname),
        ">".to_string(),
        format!("> Generated: {}", report.timestamp.to_rfc3339()),
        format!("> Pages Extracted: {}", s.successful_pages),
        String::new(),
        HR.to_string(),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        "| Metric | Value |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Total Pages | {} |", s.total_pages),
        format!("| Successful | {} |", s.successful_pages),
        format!("| Blocked | {} |", s.blocked_pages),
        format!("| Errors | {} |", s.error_pages),
        String::new(),
    ];

    let total = s.successful_pages.max(1);
    let pct = |n: usize| n * 100 / total;
    let seo = &s.seo;
    lines.extend([
        "## SEO Health".to_string(),
        String::new(),
        "| Metric | Count | Percentage |".to_string(),
        "|--------|-------|------------|".to_string(),
    ]);
    for (label, count) in [
        ("Title Tags", seo.pages_with_title),
        ("Descriptions", seo.pages_with_description),
        ("Canonical URLs", seo.pages_with_canonical),
        ("H1 Headings", seo.pages_with_h1),
        ("OpenGraph", seo.pages_with_opengraph),
        ("Twitter Cards", seo.pages_with_twitter_card),
        ("JSON-LD", seo.pages_with_jsonld),
    ] {
        lines.push(format!("| {label} | {count} | {}% |", pct(count)));
    }
    lines.push(String::new());

    let content = &s.content;
    lines.extend([
        "## Content".to_string(),
        String::new(),
        format!(
            "- **Internal Links:** {} ({} per page)",
            content.total_internal_links, content.avg_internal_links_per_page
        ),
        format!(
            "- **External Links:** {} ({} per page)",
            content.total_external_links, content.avg_external_links_per_page
        ),
        format!("- **H1 Tags:** {}", content.total_h1_tags),
        format!("- **H2 Tags:** {}", content.total_h2_tags),
        String::new(),
    ]);

    let perf = &s.performance;
    lines.extend([
        "## Performance".to_string(),
        String::new(),
        format!("- **Average Load Time:** {}ms", perf.avg_load_time_ms),
        format!("- **Fastest Page:** {}ms", perf.fastest_page_ms),
        format!("- **Slowest Page:** {}ms", perf.slowest_page_ms),
        String::new(),
    ]);

    lines.extend(["## Pages".to_string(), String::new()]);
    lines.push("| # | URL | Status | Load Time |".to_string());
    lines.push("|---|-----|--------|-----------|".to_string());
    for (i, page) in report.pages.iter().enumerate() {
        let status = serde_json::to_value(page.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        lines.push(format!(
            "| {} | {} | {status} | {}ms |",
            i + 1,
            page.url,
            page.load_time_ms
        ));
    }
    lines.push(String::new());

    push_issues(&mut lines, &report.errors, &report.warnings);
    lines.join("\n")
}

/// Per-page report written under `pages/`. Only meaningful for successful
/// pages; others render a header only.
pub fn render_page(page: &PageResult) -> String {
    let empty = ExtractedPage::default();
    let e = page.extracted.as_ref().unwrap_or(&empty);
    let meta = &e.meta;

    let mut lines = vec![
        format!("# {}", meta.title.as_deref().unwrap_or("Untitled Page")),
        String::new(),
        format!("**URL:** {}", page.url),
        format!("**Load Time:** {}ms", page.load_time_ms),
        String::new(),
        "## Metadata".to_string(),
        String::new(),
        format!(
            "- **Description:** {}",
            meta.description.as_deref().unwrap_or("Not set")
        ),
        format!(
            "- **Canonical:** {}",
            meta.canonical.as_deref().unwrap_or("Not set")
        ),
        String::new(),
        "## Headings".to_string(),
        String::new(),
    ];

    for level in 1..=6u8 {
        let headings = e.headings.level(level);
        if headings.is_empty() {
            continue;
        }
        lines.push(format!("### H{level} ({})", headings.len()));
        lines.extend(headings.iter().take(10).map(|h| format!("- {h}")));
        lines.push(String::new());
    }

    lines.extend([
        "## Links".to_string(),
        String::new(),
        format!("- **Internal:** {}", e.links.internal_count),
        format!("- **External:** {}", e.links.external_count),
        String::new(),
    ]);

    lines.join("\n")
}

/// Report for a single-page audit.
pub fn render_single(report: &PageReport) -> String {
    let target = &report.target;
    let robots = &report.robots;
    let mut lines = vec![
        "# Web Audit Report".to_string(),
        String::new(),
        format!("> Generated: {}", report.timestamp.to_rfc3339()),
        String::new(),
        HR.to_string(),
        String::new(),
        "## Target".to_string(),
        String::new(),
        format!("- **Input URL:** {}", target.input_url),
        format!("- **Final URL:** {}", target.final_url),
        format!("- **Status:** {}", target.status),
        String::new(),
        HR.to_string(),
        String::new(),
        "## Robots.txt".to_string(),
        String::new(),
        format!("- **Allowed:** {}", if robots.allowed { "Yes" } else { "No" }),
        format!(
            "- **Crawl Delay:** {}",
            robots
                .crawl_delay
                .map(|d| format!("{d}s"))
                .unwrap_or_else(|| "Not set".to_string())
        ),
        format!("- **Sitemaps Found:** {}", robots.sitemaps.len()),
    ];
    if let Some(note) = &robots.note {
        lines.push(format!("- **Note:** {note}"));
    }
    lines.push(String::new());

    if let Some(e) = &report.extracted {
        push_extracted(&mut lines, e);
    }

    let d = &report.duration;
    lines.extend([
        HR.to_string(),
        String::new(),
        "## Timing".to_string(),
        String::new(),
        format!("- **Total:** {}ms", d.total_ms),
        format!("- **Robots:** {}ms", d.robots_ms),
        format!("- **Navigation:** {}ms", d.navigation_ms),
        format!("- **Extraction:** {}ms", d.extraction_ms),
        String::new(),
    ]);

    push_issues(&mut lines, &report.errors, &report.warnings);
    lines.join("\n")
}

fn push_extracted(lines: &mut Vec<String>, e: &ExtractedPage) {
    let meta = &e.meta;
    let or = |v: &Option<String>, fallback: &str| v.clone().unwrap_or_else(|| fallback.to_string());

    lines.extend([
        HR.to_string(),
        String::new(),
        "## Metadata".to_string(),
        String::new(),
        format!("- **Title:** {}", or(&meta.title, "Not found")),
        format!("- **Description:** {}", or(&meta.description, "Not found")),
        format!("- **Canonical:** {}", or(&meta.canonical, "Not set")),
        format!("- **Robots:** {}", or(&meta.robots, "Not set")),
        format!("- **Author:** {}", or(&meta.author, "Not set")),
        format!("- **Keywords:** {}", or(&meta.keywords, "Not set")),
        String::new(),
    ]);

    let og = &e.open_graph;
    push_fields(
        lines,
        "OpenGraph",
        &[
            ("Title", &og.title),
            ("Description", &og.description),
            ("Image", &og.image),
            ("Url", &og.url),
            ("Type", &og.og_type),
            ("Site Name", &og.site_name),
        ],
    );

    let tw = &e.twitter_card;
    push_fields(
        lines,
        "Twitter Card",
        &[
            ("Card", &tw.card),
            ("Title", &tw.title),
            ("Description", &tw.description),
            ("Image", &tw.image),
            ("Site", &tw.site),
        ],
    );

    lines.extend([HR.to_string(), String::new(), "## Headings".to_string(), String::new()]);
    for level in 1..=6u8 {
        let headings = e.headings.level(level);
        lines.push(format!("- **H{level}:** {} found", headings.len()));
        for h in headings.iter().take(5) {
            lines.push(format!("  - {}", shorten(h, 100)));
        }
    }
    lines.push(String::new());

    lines.extend([
        HR.to_string(),
        String::new(),
        "## Links".to_string(),
        String::new(),
        format!("- **Internal Links:** {}", e.links.internal_count),
        format!("- **External Links:** {}", e.links.external_count),
        String::new(),
    ]);

    if !e.json_ld.is_empty() {
        lines.extend([
            HR.to_string(),
            String::new(),
            "## Structured Data (JSON-LD)".to_string(),
            String::new(),
            format!("Found {} JSON-LD object(s)", e.json_ld.len()),
            String::new(),
        ]);
        for (i, obj) in e.json_ld.iter().take(3).enumerate() {
            let pretty = serde_json::to_string_pretty(obj).unwrap_or_default();
            lines.extend([
                format!("### Object {}", i + 1),
                "```json".to_string(),
                truncate(&pretty, 1_000).to_string(),
                "```".to_string(),
                String::new(),
            ]);
        }
    }

    if !e.text_preview.is_empty() {
        lines.extend([
            HR.to_string(),
            String::new(),
            "## Text Preview".to_string(),
            String::new(),
            "```".to_string(),
            truncate(&e.text_preview, 2_000).to_string(),
            "```".to_string(),
            String::new(),
        ]);
    }
}

fn push_fields(lines: &mut Vec<String>, title: &str, fields: &[(&str, &Option<String>)]) {
    if fields.iter().all(|(_, v)| v.is_none()) {
        return;
    }
    lines.extend([HR.to_string(), String::new(), format!("## {title}"), String::new()]);
    for (label, value) in fields {
        if let Some(value) = value {
            lines.push(format!("- **{label}:** {value}"));
        }
    }
    lines.push(String::new());
}

fn push_issues(lines: &mut Vec<String>, errors: &[String], warnings: &[String]) {
    if errors.is_empty() && warnings.is_empty() {
        return;
    }
    lines.extend([HR.to_string(), String::new(), "## Issues".to_string(), String::new()]);
    lines.extend(errors.iter().map(|e| format!("- Error: {e}")));
    lines.extend(warnings.iter().map(|w| format!("- Warning: {w}")));
    lines.push(String::new());
}

/// Make `name` safe as a file name: reserved characters removed, trimmed,
/// at most 50 characters, `untitled` when nothing is left.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let trimmed = truncate(cleaned.trim(), MAX_FILENAME_CHARS).trim_end();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn shorten(s: &str, max_chars: usize) -> String {
    let cut = truncate(s, max_chars);
    if cut.len() < s.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}
