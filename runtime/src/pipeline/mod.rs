//! Audit pipelines: the multi-page site audit and the single-page visit.

pub mod config;
pub mod single;
pub mod site;
pub mod stop;
pub mod summary;
pub mod target;

pub use config::{AuditConfig, CrawlMode};
pub use single::SingleAudit;
pub use site::SiteAudit;
pub use stop::StopSignal;
pub use target::Target;

use crate::acquisition::http_client::HttpClient;
use crate::cartography::robots::{fetch_robots, RobotsPolicy};
use crate::error::{AuditError, Result};
use crate::events::{EventBus, EventKind};
use serde_json::json;
use std::time::Instant;

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

pub(crate) fn build_client(config: &AuditConfig) -> Result<HttpClient> {
    HttpClient::new(&config.user_agent).map_err(|e| AuditError::Setup(format!("{e:#}")))
}

/// Announce the run and its configuration.
pub(crate) fn emit_start(events: &EventBus, target: &Target, config: &AuditConfig) {
    events.emit(
        EventKind::PipelineStart,
        json!({ "url": target.url, "config": config }),
    );
}

/// Fetch the target's robots.txt, emitting `robots:fetch` and
/// `robots:result`. Returns the policy and the time spent.
pub(crate) async fn fetch_policy(
    events: &EventBus,
    client: &HttpClient,
    target: &Target,
    config: &AuditConfig,
) -> (RobotsPolicy, u64) {
    events.emit(EventKind::RobotsFetch, json!({ "url": target.robots_url() }));

    let start = Instant::now();
    let policy = fetch_robots(
        client,
        &target.url,
        &config.user_agent,
        config.robots_timeout_ms,
    )
    .await;
    let took = elapsed_ms(start);

    events.emit(
        EventKind::RobotsResult,
        json!({
            "allowed": policy.allowed,
            "crawl_delay": policy.crawl_delay,
            "sitemap_count": policy.sitemaps.len(),
        }),
    );

    (policy, took)
}

/// Warning added when robots.txt could not be read and the run is
/// configured to fail closed.
pub(crate) fn fail_closed_warning(policy: &RobotsPolicy) -> String {
    format!(
        "robots.txt could not be fetched ({}) - treating every page as disallowed",
        policy.note.as_deref().unwrap_or("unknown error")
    )
}
