//! `webaudit visit <url>`: audit one page.

use crate::cli::output::{self, Styled};
use crate::cli::AuditArgs;
use crate::pipeline::SingleAudit;
use crate::report::PageReport;
use anyhow::Result;

/// Run the visit command.
pub async fn run(url: &str, args: &AuditArgs) -> Result<()> {
    let s = Styled::new();
    let config = args.to_config()?;

    if !output::is_quiet() && !output::is_json() {
        output::print_header(&s, url);
        let robots = if config.respect_robots {
            s.green("respected")
        } else {
            s.yellow("ignored")
        };
        output::print_check(s.ok_sym(), "Robots", &robots);
        eprintln!();
    }

    let mut audit = SingleAudit::new(config);
    let progress = args.attach_observers(audit.events_mut())?;
    let report = audit.visit(url).await;
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

fn print_summary(s: &Styled, report: &PageReport) {
    output::print_section(s, "Target");
    output::print_check(s.ok_sym(), "Input", &report.target.input_url);
    output::print_check(s.ok_sym(), "Final", &report.target.final_url);
    let status_sym = match report.target.status {
        200..=399 => s.ok_sym(),
        0 => s.fail_sym(),
        _ => s.warn_sym(),
    };
    output::print_check(status_sym, "Status", &report.target.status.to_string());

    if let Some(extracted) = &report.extracted {
        let or_missing = |v: &Option<String>| {
            v.as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| s.dim("not found"))
        };

        output::print_section(s, "Metadata");
        output::print_check(s.ok_sym(), "Title", &or_missing(&extracted.meta.title));
        let description: String = or_missing(&extracted.meta.description)
            .chars()
            .take(60)
            .collect();
        output::print_check(s.ok_sym(), "Description", &description);
        let og_image = if extracted.open_graph.image.is_some() { "yes" } else { "no" };
        output::print_check(s.ok_sym(), "OG image", og_image);
        output::print_check(
            s.ok_sym(),
            "JSON-LD",
            &format!("{} object(s)", extracted.json_ld.len()),
        );

        output::print_section(s, "Structure");
        let headings = (1..=6)
            .map(|level| format!("H{level}: {}", extracted.headings.level(level).len()))
            .collect::<Vec<_>>()
            .join(" ");
        output::print_check(s.ok_sym(), "Headings", &headings);
        output::print_check(
            s.ok_sym(),
            "Internal links",
            &extracted.links.internal_count.to_string(),
        );
        output::print_check(
            s.ok_sym(),
            "External links",
            &extracted.links.external_count.to_string(),
        );
    }

    print_issues(s, &report.errors, &report.warnings);

    if let Some(path) = &report.artifacts.json_path {
        output::print_section(s, "Artifacts");
        output::print_check(s.ok_sym(), "JSON report", path);
    }
    if let Some(path) = &report.artifacts.markdown_path {
        output::print_check(s.ok_sym(), "Markdown report", path);
    }

    eprintln!();
    eprintln!(
        "  {} ({})",
        s.bold("Audit complete"),
        output::format_millis(report.duration.total_ms)
    );
}

/// Print errors and warnings, if any.
pub(crate) fn print_issues(s: &Styled, errors: &[String], warnings: &[String]) {
    if errors.is_empty() && warnings.is_empty() {
        return;
    }
    output::print_section(s, "Issues");
    for e in errors {
        eprintln!("    {} {}", s.fail_sym(), s.red(e));
    }
    for w in warnings {
        eprintln!("    {} {}", s.warn_sym(), s.yellow(w));
    }
}
