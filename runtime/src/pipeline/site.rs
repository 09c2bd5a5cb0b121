//! Site audit: robots.txt, discovery, per-page crawl, aggregation, persistence.

use super::config::{AuditConfig, CrawlMode};
use super::stop::StopSignal;
use super::summary::summarize;
use super::target::Target;
use super::{build_client, elapsed_ms, emit_start, fail_closed_warning, fetch_policy};
use crate::acquisition::http_client::HttpClient;
use crate::cartography::crawler::{CrawlSettings, CrawledPage, PageCrawler};
use crate::cartography::rate_limiter::{delay_from_secs, HostGates};
use crate::cartography::robots::RobotsPolicy;
use crate::cartography::sitemap::discover_all;
use crate::error::Result;
use crate::events::{EventBus, EventKind};
use crate::extraction::{HtmlExtractor, PageExtractor};
use crate::renderer::http::HttpPageFetcher;
use crate::renderer::{FetchSession, PageFetcher};
use crate::report::{
    DiscoveryInfo, PageResult, PageStatus, ReportWriter, Screenshot, SiteArtifacts,
    SiteDurations, SiteInfo, SiteReport, REPORT_VERSION,
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const NO_SITEMAP_WARNING: &str =
    "No sitemap found or sitemap empty - extracting provided URL only";

/// Multi-page audit of one site.
///
/// ```no_run
/// # async fn demo() -> webaudit_runtime::error::Result<()> {
/// use webaudit_runtime::pipeline::{AuditConfig, CrawlMode, SiteAudit};
///
/// let config = AuditConfig {
///     crawl_mode: CrawlMode::Sitemap,
///     ..AuditConfig::default()
/// };
/// let report = SiteAudit::new(config).run("example.com").await?;
/// println!("{} pages", report.summary.total_pages);
/// # Ok(())
/// # }
/// ```
pub struct SiteAudit {
    config: AuditConfig,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn PageExtractor>,
    events: EventBus,
    stop: StopSignal,
}

/// URLs chosen by the discovery phase.
struct Discovery {
    urls: Vec<String>,
    info: DiscoveryInfo,
    warning: Option<String>,
}

/// Pages crawled so far, in discovery order.
struct CrawlOutcome {
    pages: Vec<CrawledPage>,
    interrupted: bool,
}

impl SiteAudit {
    /// Audit with the HTTP fetcher and the HTML extractor.
    pub fn new(config: AuditConfig) -> Self {
        let fetcher = Arc::new(HttpPageFetcher::new(&config.user_agent));
        Self {
            config,
            fetcher,
            extractor: Arc::new(HtmlExtractor::new()),
            events: EventBus::new(),
            stop: StopSignal::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Subscribe observers before calling [`run`](Self::run).
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// A handle that stops the run at the next page boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Audit the site behind `url`.
    ///
    /// Fails only when `url` is not a usable http(s) URL or the HTTP client
    /// cannot be built. Everything after that ends up in the report.
    pub async fn run(&self, url: &str) -> Result<SiteReport> {
        let started = Instant::now();
        let target = Target::parse(url)?;
        let client = build_client(&self.config)?;
        let mut durations = SiteDurations::default();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        emit_start(&self.events, &target, &self.config);
        info!("site audit of {} ({:?} mode)", target.url, self.config.crawl_mode);

        let (policy, robots_ms) = fetch_policy(&self.events, &client, &target, &self.config).await;
        durations.robots_ms = robots_ms;
        let fail_closed =
            self.config.respect_robots && self.config.robots_fail_closed && policy.fetch_failed();
        if fail_closed {
            warnings.push(fail_closed_warning(&policy));
        }

        let discovery_start = Instant::now();
        let discovery = self.discover(&client, &target, &policy).await;
        durations.sitemap_ms = elapsed_ms(discovery_start);
        warnings.extend(discovery.warning);

        let crawl_start = Instant::now();
        let outcome = self.crawl(&policy, &discovery.urls).await;
        durations.crawl_ms = elapsed_ms(crawl_start);

        let planned = discovery.urls.len().min(self.config.max_pages);
        if outcome.interrupted {
            warnings.push(format!(
                "Crawl stopped after {} of {planned} pages",
                outcome.pages.len()
            ));
        }

        let mut screenshots = Vec::new();
        let mut pages = Vec::with_capacity(outcome.pages.len());
        for (i, crawled) in outcome.pages.into_iter().enumerate() {
            if crawled.result.status == PageStatus::Error {
                let reason = crawled.result.error.as_deref().unwrap_or("unknown error");
                errors.push(format!("{}: {reason}", crawled.result.url));
            }
            if let Some(png) = crawled.screenshot {
                screenshots.push(Screenshot {
                    index: i + 1,
                    url: crawled.result.url.clone(),
                    png,
                });
            }
            pages.push(crawled.result);
        }

        let summary = summarize(&pages);
        durations.total_ms = elapsed_ms(started);

        let mut report = SiteReport {
            version: REPORT_VERSION.to_string(),
            timestamp: Utc::now(),
            site: SiteInfo {
                input_url: target.input.clone(),
                origin: target.origin.clone(),
                hostname: target.hostname.clone(),
            },
            sitemap: discovery.info,
            pages,
            summary,
            duration: durations,
            errors,
            warnings,
            interrupted: outcome.interrupted,
            artifacts: SiteArtifacts::default(),
            robots: policy,
        };

        self.persist(&mut report, &screenshots);

        info!(
            "site audit of {} finished: {} ok, {} blocked, {} errors",
            target.url,
            report.summary.successful_pages,
            report.summary.blocked_pages,
            report.summary.error_pages
        );
        self.events
            .emit(EventKind::PipelineEnd, json!({ "summary": report.summary }));

        Ok(report)
    }

    async fn discover(&self, client: &HttpClient, target: &Target, policy: &RobotsPolicy) -> Discovery {
        match self.config.crawl_mode {
            CrawlMode::Single => {
                self.events.emit(
                    EventKind::ExtractPartial,
                    json!({ "extractor_name": "single", "data": { "urls_found": 1 } }),
                );
                Discovery {
                    urls: vec![target.url.clone()],
                    info: DiscoveryInfo {
                        discovered: true,
                        total_urls: 1,
                        sitemap_urls: Vec::new(),
                    },
                    warning: None,
                }
            }
            CrawlMode::Sitemap => {
                self.events
                    .emit(EventKind::ExtractStart, json!({ "extractors": ["sitemap"] }));

                let seeds = if policy.sitemaps.is_empty() {
                    vec![target.default_sitemap_url()]
                } else {
                    policy.sitemaps.clone()
                };
                let entries = discover_all(
                    client,
                    &target.origin,
                    &seeds,
                    self.config.max_pages,
                    self.config.robots_timeout_ms,
                )
                .await;

                self.events.emit(
                    EventKind::ExtractPartial,
                    json!({ "extractor_name": "sitemap", "data": { "urls_found": entries.len() } }),
                );

                if entries.is_empty() {
                    warn!("no sitemap URLs for {}, auditing the target only", target.url);
                    return Discovery {
                        urls: vec![target.url.clone()],
                        info: DiscoveryInfo {
                            discovered: false,
                            total_urls: 1,
                            sitemap_urls: seeds,
                        },
                        warning: Some(NO_SITEMAP_WARNING.to_string()),
                    };
                }

                let urls: Vec<String> = entries.into_iter().map(|e| e.loc).collect();
                Discovery {
                    info: DiscoveryInfo {
                        discovered: true,
                        total_urls: urls.len(),
                        sitemap_urls: seeds,
                    },
                    urls,
                    warning: None,
                }
            }
        }
    }

    async fn crawl(&self, policy: &RobotsPolicy, discovered: &[String]) -> CrawlOutcome {
        let urls = &discovered[..discovered.len().min(self.config.max_pages)];
        let settings = CrawlSettings {
            user_agent: self.config.user_agent.clone(),
            driver: self
                .config
                .driver
                .clone()
                .unwrap_or_else(|| self.fetcher.name().to_string()),
            timeout_ms: self.config.timeout,
            respect_robots: self.config.respect_robots,
            fail_closed: self.config.robots_fail_closed,
            capture_screenshots: self.config.save_screenshot && self.config.output_dir.is_some(),
        };
        let crawler = PageCrawler::new(policy, self.extractor.as_ref(), &self.events, &settings);
        let delay = delay_from_secs(policy.crawl_delay.unwrap_or(self.config.crawl_delay));

        let workers = self.config.workers().min(urls.len().max(1));
        let mut sessions = Vec::with_capacity(workers);
        let mut open_error = None;
        for _ in 0..workers {
            match self.fetcher.open().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!("could not open {} session: {e:#}", self.fetcher.name());
                    open_error = Some(format!("{e:#}"));
                    break;
                }
            }
        }

        let outcome = match (sessions.len(), open_error) {
            (0, Some(reason)) => self.crawl_without_fetcher(&crawler, urls, &reason),
            (1, _) => self.crawl_sequential(&crawler, sessions[0].as_mut(), urls, delay).await,
            _ => self.crawl_pooled(&crawler, &mut sessions, urls, delay).await,
        };

        for session in sessions {
            if let Err(e) = session.close().await {
                warn!("failed to close fetch session: {e:#}");
            }
        }

        outcome
    }

    fn announce_page(&self, index: usize, total: usize, url: &str) {
        self.events.emit(
            EventKind::ExtractPartial,
            json!({
                "extractor_name": "page",
                "data": { "current": index + 1, "total": total, "url": url },
            }),
        );
    }

    /// One page at a time, sleeping `delay` between pages.
    async fn crawl_sequential(
        &self,
        crawler: &PageCrawler<'_>,
        session: &mut dyn FetchSession,
        urls: &[String],
        delay: Duration,
    ) -> CrawlOutcome {
        let mut pages = Vec::with_capacity(urls.len());

        for (i, url) in urls.iter().enumerate() {
            if self.stop.is_stopped() {
                return CrawlOutcome {
                    pages,
                    interrupted: true,
                };
            }

            self.announce_page(i, urls.len(), url);
            pages.push(crawler.crawl(session, url).await);

            let is_last = i + 1 == urls.len();
            if !is_last && !self.stop.sleep(delay).await {
                return CrawlOutcome {
                    pages,
                    interrupted: true,
                };
            }
        }

        CrawlOutcome {
            pages,
            interrupted: false,
        }
    }

    /// Workers share a FIFO of discovered URLs; each host is paced by a gate
    /// seeded with `delay`. Workers run on this task, so events are never
    /// emitted concurrently. Results are put back into discovery order.
    async fn crawl_pooled(
        &self,
        crawler: &PageCrawler<'_>,
        sessions: &mut [Box<dyn FetchSession>],
        urls: &[String],
        delay: Duration,
    ) -> CrawlOutcome {
        let queue = Mutex::new(urls.iter().enumerate().collect::<VecDeque<_>>());
        let results = Mutex::new(Vec::with_capacity(urls.len()));
        let gates = HostGates::new(delay);
        let interrupted = AtomicBool::new(false);
        let total = urls.len();

        let workers = sessions.iter_mut().map(|session| {
            let (queue, results, gates, interrupted) = (&queue, &results, &gates, &interrupted);
            async move {
                loop {
                    if self.stop.is_stopped() {
                        interrupted.store(true, Ordering::SeqCst);
                        break;
                    }
                    let Some((index, url)) = queue.lock().await.pop_front() else {
                        break;
                    };

                    self.announce_page(index, total, url);
                    if crawler.is_permitted(url) {
                        let cancelled = tokio::select! {
                            _ = gates.acquire(url) => false,
                            _ = self.stop.cancelled() => true,
                        };
                        if cancelled {
                            interrupted.store(true, Ordering::SeqCst);
                            break;
                        }
                    }

                    let page = crawler.crawl(session.as_mut(), url).await;
                    results.lock().await.push((index, page));
                }
            }
        });
        join_all(workers).await;

        let mut results = results.into_inner();
        results.sort_by_key(|(index, _)| *index);
        let interrupted = interrupted.load(Ordering::SeqCst) && results.len() < total;

        CrawlOutcome {
            pages: results.into_iter().map(|(_, page)| page).collect(),
            interrupted,
        }
    }

    /// No session could be opened: pages the policy allows become errors,
    /// the rest are still reported as blocked.
    fn crawl_without_fetcher(
        &self,
        crawler: &PageCrawler<'_>,
        urls: &[String],
        reason: &str,
    ) -> CrawlOutcome {
        self.events.emit(
            EventKind::Error,
            json!({ "message": format!("page fetcher unavailable: {reason}") }),
        );
        let pages = urls
            .iter()
            .map(|url| {
                let result = if crawler.is_permitted(url) {
                    PageResult::failed(url.as_str(), 0, format!("page fetcher unavailable: {reason}"))
                } else {
                    PageResult::blocked(url.as_str(), 0)
                };
                CrawledPage::from(result)
            })
            .collect();
        CrawlOutcome {
            pages,
            interrupted: false,
        }
    }

    fn persist(&self, report: &mut SiteReport, screenshots: &[Screenshot]) {
        let Some(output_dir) = &self.config.output_dir else {
            return;
        };
        let writer = ReportWriter::new(output_dir, self.config.format, &self.events);
        let robots_raw = if self.config.save_robots {
            report.robots.raw.clone()
        } else {
            None
        };

        if let Err(e) = writer.write_site(report, screenshots, robots_raw.as_deref()) {
            let message = format!("Failed to save report: {e:#}");
            warn!("{message}");
            self.events.emit(EventKind::Error, json!({ "message": message }));
            report.errors.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractedPage;
    use crate::renderer::NavigationResult;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingFetcher {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
        fail_open: bool,
    }

    impl CountingFetcher {
        fn new(fail_open: bool) -> Self {
            Self {
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
                fail_open,
            }
        }
    }

    struct EchoSession {
        closed: Arc<AtomicUsize>,
        last: String,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        fn name(&self) -> &str {
            "counting"
        }

        async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>> {
            if self.fail_open {
                anyhow::bail!("no browser available");
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoSession {
                closed: Arc::clone(&self.closed),
                last: String::new(),
            }))
        }
    }

    #[async_trait]
    impl FetchSession for EchoSession {
        async fn fetch_document(&mut self, url: &str, _timeout_ms: u64) -> NavigationResult {
            self.last = url.to_string();
            NavigationResult {
                final_url: url.to_string(),
                status: 200,
                redirect_chain: Vec::new(),
                load_time_ms: 5,
            }
        }

        async fn content(&mut self) -> anyhow::Result<String> {
            Ok(format!("<title>{}</title>", self.last))
        }

        async fn screenshot(&mut self) -> Option<Vec<u8>> {
            None
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NullExtractor;

    impl PageExtractor for NullExtractor {
        fn extract(&self, _html: &str, _base_url: &str) -> anyhow::Result<ExtractedPage> {
            Ok(ExtractedPage::default())
        }
    }

    fn policy() -> RobotsPolicy {
        RobotsPolicy::from_raw(
            "https://example.com/robots.txt",
            "User-agent: *\nDisallow: /private",
            "https://example.com/",
            "WebAuditBot",
        )
    }

    fn audit(fetcher: Arc<CountingFetcher>, concurrency: usize) -> SiteAudit {
        let config = AuditConfig {
            crawl_delay: 0.0,
            concurrency,
            output_dir: None,
            user_agent: "WebAuditBot".into(),
            ..AuditConfig::default()
        };
        SiteAudit::new(config)
            .with_fetcher(fetcher)
            .with_extractor(Arc::new(NullExtractor))
    }

    fn urls(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| format!("https://example.com{p}")).collect()
    }

    #[tokio::test]
    async fn test_sequential_crawl_reuses_one_session() {
        let fetcher = Arc::new(CountingFetcher::new(false));
        let audit = audit(Arc::clone(&fetcher), 1);
        let outcome = audit.crawl(&policy(), &urls(&["/", "/about", "/private"])).await;

        let statuses: Vec<_> = outcome.pages.iter().map(|p| p.result.status).collect();
        assert_eq!(
            statuses,
            vec![PageStatus::Success, PageStatus::Success, PageStatus::Blocked]
        );
        assert!(!outcome.interrupted);
        assert_eq!(fetcher.opened.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pooled_crawl_keeps_discovery_order() {
        let fetcher = Arc::new(CountingFetcher::new(false));
        let audit = audit(Arc::clone(&fetcher), 3);
        let discovered = urls(&["/a", "/b", "/private/x", "/c", "/d"]);
        let outcome = audit.crawl(&policy(), &discovered).await;

        let reached: Vec<_> = outcome.pages.iter().map(|p| p.result.url.clone()).collect();
        assert_eq!(reached, discovered);
        assert_eq!(outcome.pages[2].result.status, PageStatus::Blocked);
        assert_eq!(fetcher.opened.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unavailable_fetcher_turns_pages_into_errors() {
        let fetcher = Arc::new(CountingFetcher::new(true));
        let audit = audit(Arc::clone(&fetcher), 1);
        let outcome = audit.crawl(&policy(), &urls(&["/", "/private"])).await;

        assert_eq!(outcome.pages[0].result.status, PageStatus::Error);
        assert!(outcome.pages[0]
            .result
            .error
            .as_deref()
            .unwrap()
            .contains("no browser available"));
        assert_eq!(outcome.pages[1].result.status, PageStatus::Blocked);
    }

    #[tokio::test]
    async fn test_max_pages_bounds_the_crawl() {
        let fetcher = Arc::new(CountingFetcher::new(false));
        let mut audit = audit(fetcher, 1);
        audit.config.max_pages = 2;
        let outcome = audit.crawl(&policy(), &urls(&["/a", "/b", "/c"])).await;
        assert_eq!(outcome.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_stopped_before_start_crawls_nothing() {
        let fetcher = Arc::new(CountingFetcher::new(false));
        let audit = audit(fetcher, 1);
        audit.stop_signal().stop();
        let outcome = audit.crawl(&policy(), &urls(&["/a", "/b"])).await;
        assert!(outcome.pages.is_empty());
        assert!(outcome.interrupted);
    }

    #[tokio::test]
    async fn test_invalid_target_is_fatal() {
        let fetcher = Arc::new(CountingFetcher::new(false));
        let audit = audit(fetcher, 1);
        let err = audit.run("http://exa mple.com").await.unwrap_err();
        assert!(matches!(err, crate::error::AuditError::InvalidUrl { .. }));
    }
}
