//! Fetch and evaluate robots.txt policies.
//!
//! Evaluation is longest-match with allow precedence on ties: the longest
//! matching `Allow` and `Disallow` rules (trailing `*` stripped) are
//! compared, and only a strictly longer `Disallow` blocks the path. Rules
//! from every group that applies to the agent accumulate together.
//!
//! Fetching is fail-open. A missing file, an HTTP error, or a transport
//! failure all produce a policy that allows the target, with the cause kept
//! in [`RobotsPolicy::note`].

use crate::acquisition::http_client::{self, HttpClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, warn};

/// How the policy document fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotsOutcome {
    /// 200 response; rules were parsed.
    Fetched,
    /// 404 response; no policy exists.
    NotFound,
    /// Any other non-200 status.
    HttpError,
    /// The request timed out.
    Timeout,
    /// Transport failure or an unusable target URL.
    Failed,
}

/// Fetched policy for one site, evaluated against the original target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotsPolicy {
    /// URL of the policy document.
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    /// Whether the original target URL is allowed.
    pub allowed: bool,
    /// Crawl delay in seconds declared for this agent.
    pub crawl_delay: Option<f64>,
    /// `Sitemap:` values in file order.
    pub sitemaps: Vec<String>,
    /// Raw policy text, absent when the fetch did not succeed.
    #[serde(default)]
    pub raw: Option<String>,
    pub outcome: RobotsOutcome,
    /// Diagnostic note for anything other than a clean fetch.
    pub note: Option<String>,
}

impl RobotsPolicy {
    /// A policy that allows everything, used for every failed fetch.
    fn open(url: &str, outcome: RobotsOutcome, note: String) -> Self {
        Self {
            url: url.to_string(),
            fetched_at: Utc::now(),
            allowed: true,
            crawl_delay: None,
            sitemaps: Vec::new(),
            raw: None,
            outcome,
            note: Some(note),
        }
    }

    /// Build a policy from a fetched document.
    pub fn from_raw(url: &str, raw: &str, target_url: &str, user_agent: &str) -> Self {
        let rules = parse_robots(raw, user_agent);
        Self {
            url: url.to_string(),
            fetched_at: Utc::now(),
            allowed: rules.is_allowed(&url_path(target_url)),
            crawl_delay: rules.crawl_delay,
            sitemaps: rules.sitemaps,
            raw: Some(raw.to_string()),
            outcome: RobotsOutcome::Fetched,
            note: None,
        }
    }

    /// Evaluate the stored rules for another URL on the same site.
    ///
    /// Always re-parses `raw`; nothing is cached per path.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.raw {
            Some(raw) => evaluate(raw, &url_path(url), user_agent),
            None => true,
        }
    }

    /// True when the document should have been readable but was not.
    /// A 404 is an absent policy, not a failure.
    pub fn fetch_failed(&self) -> bool {
        matches!(
            self.outcome,
            RobotsOutcome::HttpError | RobotsOutcome::Timeout | RobotsOutcome::Failed
        )
    }
}

/// Rules that apply to one agent, accumulated over all matching groups.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    pub allowed: Vec<String>,
    pub disallowed: Vec<String>,
    pub crawl_delay: Option<f64>,
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Check if a path is allowed by the rules.
    pub fn is_allowed(&self, path: &str) -> bool {
        let best_allow = longest_match(&self.allowed, path);
        let best_disallow = longest_match(&self.disallowed, path);

        match (best_allow, best_disallow) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}

/// Evaluate `path` against a raw policy for `user_agent`.
pub fn evaluate(raw: &str, path: &str, user_agent: &str) -> bool {
    parse_robots(raw, user_agent).is_allowed(path)
}

/// Parse a robots.txt string for a specific user agent.
///
/// Malformed lines and unparseable delays are skipped.
pub fn parse_robots(txt: &str, user_agent: &str) -> RobotsRules {
    let mut rules = RobotsRules::default();
    let mut in_matching_group = false;

    for line in txt.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Remove inline comments
        let line = line.split('#').next().unwrap_or("").trim();

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                in_matching_group = agent_applies(value, user_agent);
            }
            "allow" if in_matching_group => {
                if !value.is_empty() {
                    rules.allowed.push(value.to_string());
                }
            }
            "disallow" if in_matching_group => {
                if !value.is_empty() {
                    rules.disallowed.push(value.to_string());
                }
            }
            "crawl-delay" if in_matching_group => {
                if let Ok(delay) = value.parse::<f64>() {
                    if delay.is_finite() && delay >= 0.0 {
                        rules.crawl_delay = Some(delay);
                    }
                }
            }
            "sitemap" => {
                // Sitemap directives are global
                if !value.is_empty() {
                    rules.sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    rules
}

/// Fetch `scheme://host/robots.txt` for the target and evaluate it.
pub async fn fetch_robots(
    client: &HttpClient,
    target_url: &str,
    user_agent: &str,
    timeout_ms: u64,
) -> RobotsPolicy {
    let robots_url = match robots_url_for(target_url) {
        Ok(url) => url,
        Err(e) => {
            return RobotsPolicy::open(target_url, RobotsOutcome::Failed, format!("Invalid URL: {e}"))
        }
    };

    debug!("fetching {robots_url}");

    match client.get(&robots_url, timeout_ms).await {
        Ok(resp) if resp.status == 200 => {
            RobotsPolicy::from_raw(&robots_url, &resp.body, target_url, user_agent)
        }
        Ok(resp) if resp.status == 404 => RobotsPolicy::open(
            &robots_url,
            RobotsOutcome::NotFound,
            "robots.txt not found (404)".to_string(),
        ),
        Ok(resp) => {
            warn!("{robots_url} returned HTTP {}, allowing all paths", resp.status);
            RobotsPolicy::open(
                &robots_url,
                RobotsOutcome::HttpError,
                format!("HTTP {}", resp.status),
            )
        }
        Err(e) if http_client::is_timeout(&e) => {
            warn!("{robots_url} timed out, allowing all paths");
            RobotsPolicy::open(&robots_url, RobotsOutcome::Timeout, "Request timeout".to_string())
        }
        Err(e) => {
            warn!("failed to fetch {robots_url}: {e}, allowing all paths");
            RobotsPolicy::open(&robots_url, RobotsOutcome::Failed, e.to_string())
        }
    }
}

/// `scheme://host[:port]/robots.txt` for any URL on the site.
pub fn robots_url_for(target_url: &str) -> Result<String, url::ParseError> {
    let parsed = url::Url::parse(target_url)?;
    Ok(format!("{}/robots.txt", parsed.origin().ascii_serialization()))
}

/// An agent token applies when it is `*`, a case-insensitive prefix of the
/// actor identity, or contained in it.
fn agent_applies(agent: &str, user_agent: &str) -> bool {
    let agent = agent.trim().to_lowercase();
    let ua = user_agent.to_lowercase();
    agent == "*" || ua.starts_with(&agent) || ua.contains(&agent)
}

/// Length of the longest rule matching `path`, trailing `*` stripped.
/// Rules and path are compared percent-decoded.
fn longest_match(patterns: &[String], path: &str) -> Option<usize> {
    let path = percent_decoded(path);
    patterns
        .iter()
        .map(|pattern| percent_decoded(pattern))
        .filter(|pattern| path_matches(&path, pattern))
        .map(|pattern| pattern.trim_end_matches('*').len())
        .max()
}

fn percent_decoded(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

/// Check if a path matches a robots.txt pattern.
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern == "/" || pattern == "/*" {
        return true;
    }
    path.starts_with(pattern.trim_end_matches('*'))
}

/// Path component of a URL, `/` when empty or unparseable.
fn url_path(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .map(|u| u.path().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string())
}
