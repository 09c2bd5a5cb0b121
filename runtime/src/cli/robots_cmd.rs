//! `webaudit robots <url>`: check robots.txt without visiting the page.

use crate::acquisition::http_client::HttpClient;
use crate::cartography::robots::fetch_robots;
use crate::cli::output::{self, Styled};
use crate::pipeline::config::DEFAULT_USER_AGENT;
use crate::pipeline::Target;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct RobotsArgs {
    /// User agent the rules are evaluated for
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Request timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    pub timeout: u64,

    /// Further paths on the same site to evaluate
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<String>,
}

pub async fn run(url: &str, args: &RobotsArgs) -> Result<()> {
    let s = Styled::new();
    let target = Target::parse(url)?;
    let client = HttpClient::new(&args.user_agent)?;
    let policy = fetch_robots(&client, &target.url, &args.user_agent, args.timeout).await;

    let extra: Vec<(String, bool)> = args
        .paths
        .iter()
        .map(|p| {
            let url = format!("{}/{}", target.origin, p.trim_start_matches('/'));
            let allowed = policy.is_allowed(&url, &args.user_agent);
            (url, allowed)
        })
        .collect();

    if output::is_json() {
        let checks: Vec<_> = extra
            .iter()
            .map(|(url, allowed)| serde_json::json!({ "url": url, "allowed": allowed }))
            .collect();
        return output::print_json(&serde_json::json!({ "policy": policy, "checks": checks }));
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::print_header(&s, &target.url);
    let verdict = |allowed: bool| {
        if allowed {
            (s.ok_sym(), s.green("allowed"))
        } else {
            (s.fail_sym(), s.red("blocked"))
        }
    };

    let (sym, label) = verdict(policy.allowed);
    output::print_check(sym, "Target", &label);
    output::print_check(s.ok_sym(), "Robots URL", &policy.url);
    let delay = policy
        .crawl_delay
        .map(|d| format!("{d}s"))
        .unwrap_or_else(|| s.dim("not specified"));
    output::print_check(s.ok_sym(), "Crawl delay", &delay);
    output::print_check(s.ok_sym(), "Sitemaps", &policy.sitemaps.len().to_string());
    for sitemap in &policy.sitemaps {
        eprintln!("      {}", s.dim(sitemap));
    }

    if !extra.is_empty() {
        output::print_section(&s, "Paths");
        for (url, allowed) in &extra {
            let (sym, label) = verdict(*allowed);
            output::print_check(sym, &label, url);
        }
    }

    if let Some(note) = &policy.note {
        eprintln!();
        eprintln!("  {} {note}", s.warn_sym());
    }
    Ok(())
}
