//! Per-page crawl step: policy check, fetch, extract.

use crate::cartography::robots::RobotsPolicy;
use crate::events::{EventBus, EventKind};
use crate::extraction::PageExtractor;
use crate::renderer::FetchSession;
use crate::report::{PageResult, PageStatus};
use anyhow::{Context, Result};
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, warn};

/// A crawled page plus the screenshot captured for it, if any.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub result: PageResult,
    pub screenshot: Option<Vec<u8>>,
}

impl From<PageResult> for CrawledPage {
    fn from(result: PageResult) -> Self {
        Self {
            result,
            screenshot: None,
        }
    }
}

/// Settings shared by every page of one run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub user_agent: String,
    /// Announced in `navigate:start`.
    pub driver: String,
    pub timeout_ms: u64,
    pub respect_robots: bool,
    /// Treat a failed policy fetch as disallowing every page.
    pub fail_closed: bool,
    pub capture_screenshots: bool,
}

/// Crawls single pages against one site policy.
///
/// A page never fails the run: fetch errors, extractor errors and panics
/// are all turned into a `PageResult` with status `error`.
pub struct PageCrawler<'a> {
    policy: &'a RobotsPolicy,
    extractor: &'a dyn PageExtractor,
    events: &'a EventBus,
    settings: &'a CrawlSettings,
}

impl<'a> PageCrawler<'a> {
    pub fn new(
        policy: &'a RobotsPolicy,
        extractor: &'a dyn PageExtractor,
        events: &'a EventBus,
        settings: &'a CrawlSettings,
    ) -> Self {
        Self {
            policy,
            extractor,
            events,
            settings,
        }
    }

    /// Whether the policy lets this run fetch `url`.
    pub fn is_permitted(&self, url: &str) -> bool {
        if !self.settings.respect_robots {
            return true;
        }
        if self.settings.fail_closed && self.policy.fetch_failed() {
            return false;
        }
        self.policy.is_allowed(url, &self.settings.user_agent)
    }

    /// Crawl one page with `session`.
    pub async fn crawl(&self, session: &mut dyn FetchSession, url: &str) -> CrawledPage {
        let start = Instant::now();

        if !self.is_permitted(url) {
            debug!("robots.txt blocks {url}");
            return PageResult::blocked(url, elapsed_ms(start)).into();
        }

        let outcome = AssertUnwindSafe(self.fetch_and_extract(session, url))
            .catch_unwind()
            .await;

        let page = match outcome {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => PageResult::failed(url, elapsed_ms(start), format!("{e:#}")).into(),
            Err(payload) => {
                let reason = format!("panic: {}", panic_message(payload.as_ref()));
                PageResult::failed(url, elapsed_ms(start), reason).into()
            }
        };

        if page.result.status == PageStatus::Error {
            let reason = page.result.error.as_deref().unwrap_or("unknown error");
            warn!("page {url} failed: {reason}");
            self.events
                .emit(EventKind::Error, json!({ "message": format!("{url}: {reason}") }));
        }

        page
    }

    async fn fetch_and_extract(
        &self,
        session: &mut dyn FetchSession,
        url: &str,
    ) -> Result<CrawledPage> {
        self.events.emit(
            EventKind::NavigateStart,
            json!({ "url": url, "driver": self.settings.driver }),
        );

        let nav = session.fetch_document(url, self.settings.timeout_ms).await;

        self.events.emit(
            EventKind::NavigateComplete,
            json!({
                "final_url": nav.final_url,
                "status": nav.status,
                "load_time_ms": nav.load_time_ms,
            }),
        );

        if nav.status == 0 {
            return Ok(PageResult::failed(url, nav.load_time_ms, "Navigation failed").into());
        }
        if nav.status >= 400 {
            let reason = format!("HTTP {}", nav.status);
            return Ok(PageResult::failed(url, nav.load_time_ms, reason).into());
        }

        let html = session.content().await.context("reading page content")?;
        let screenshot = if self.settings.capture_screenshots {
            session.screenshot().await
        } else {
            None
        };

        let extracted = self
            .extractor
            .extract(&html, &nav.final_url)
            .context("extracting page data")?;

        self.events.emit(
            EventKind::ExtractComplete,
            json!({ "extracted": extracted }),
        );

        Ok(CrawledPage {
            result: PageResult::success(nav.final_url, nav.load_time_ms, extracted),
            screenshot,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::extraction::ExtractedPage;
    use crate::renderer::NavigationResult;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct StubSession {
        status: u16,
        body: String,
        fetched: Vec<String>,
    }

    impl StubSession {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                fetched: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl FetchSession for StubSession {
        async fn fetch_document(&mut self, url: &str, _timeout_ms: u64) -> NavigationResult {
            self.fetched.push(url.to_string());
            NavigationResult {
                final_url: url.to_string(),
                status: self.status,
                redirect_chain: Vec::new(),
                load_time_ms: 7,
            }
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.body.clone())
        }

        async fn screenshot(&mut self) -> Option<Vec<u8>> {
            Some(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct TitleExtractor;

    impl PageExtractor for TitleExtractor {
        fn extract(&self, html: &str, _base_url: &str) -> Result<ExtractedPage> {
            if html.contains("boom") {
                panic!("extractor exploded");
            }
            if html.contains("bad") {
                anyhow::bail!("unparseable");
            }
            let mut page = ExtractedPage::default();
            page.meta.title = Some(html.to_string());
            Ok(page)
        }
    }

    fn settings() -> CrawlSettings {
        CrawlSettings {
            user_agent: "TestBot".into(),
            driver: "stub".into(),
            timeout_ms: 1_000,
            respect_robots: true,
            fail_closed: false,
            capture_screenshots: false,
        }
    }

    fn policy(raw: &str) -> RobotsPolicy {
        RobotsPolicy::from_raw(
            "https://example.com/robots.txt",
            raw,
            "https://example.com/",
            "TestBot",
        )
    }

    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut bus = EventBus::new();
        bus.on_any(move |e: &Event| -> Result<()> {
            sink.lock().unwrap().push(e.kind.to_string());
            Ok(())
        });
        (bus, seen)
    }

    #[tokio::test]
    async fn test_blocked_page_is_not_fetched() {
        let policy = policy("User-agent: *\nDisallow: /private");
        let (bus, seen) = recording_bus();
        let settings = settings();
        let crawler = PageCrawler::new(&policy, &TitleExtractor, &bus, &settings);
        let mut session = StubSession::new(200, "hello");

        let page = crawler
            .crawl(&mut session, "https://example.com/private/a")
            .await;
        assert_eq!(page.result.status, PageStatus::Blocked);
        assert!(session.fetched.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_emits_navigation_and_extraction() {
        let policy = policy("User-agent: *\nDisallow: /private");
        let (bus, seen) = recording_bus();
        let mut settings = settings();
        settings.capture_screenshots = true;
        let crawler = PageCrawler::new(&policy, &TitleExtractor, &bus, &settings);
        let mut session = StubSession::new(200, "hello");

        let page = crawler.crawl(&mut session, "https://example.com/about").await;
        assert_eq!(page.result.status, PageStatus::Success);
        assert_eq!(page.result.load_time_ms, 7);
        assert_eq!(
            page.result.extracted.unwrap().meta.title.as_deref(),
            Some("hello")
        );
        assert!(page.screenshot.is_some());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["navigate:start", "navigate:complete", "extract:complete"]
        );
    }

    #[tokio::test]
    async fn test_http_error_status_skips_extraction() {
        let policy = policy("");
        let (bus, seen) = recording_bus();
        let settings = settings();
        let crawler = PageCrawler::new(&policy, &TitleExtractor, &bus, &settings);
        let mut session = StubSession::new(503, "boom");

        let page = crawler.crawl(&mut session, "https://example.com/").await;
        assert_eq!(page.result.status, PageStatus::Error);
        assert_eq!(page.result.error.as_deref(), Some("HTTP 503"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["navigate:start", "navigate:complete", "error"]
        );
    }

    #[tokio::test]
    async fn test_extractor_error_and_panic_are_isolated() {
        let policy = policy("");
        let (bus, _seen) = recording_bus();
        let settings = settings();
        let crawler = PageCrawler::new(&policy, &TitleExtractor, &bus, &settings);

        let mut session = StubSession::new(200, "bad markup");
        let page = crawler.crawl(&mut session, "https://example.com/a").await;
        assert_eq!(page.result.status, PageStatus::Error);
        assert!(page.result.error.unwrap().contains("unparseable"));

        let mut session = StubSession::new(200, "boom");
        let page = crawler.crawl(&mut session, "https://example.com/b").await;
        assert_eq!(page.result.status, PageStatus::Error);
        assert!(page.result.error.unwrap().contains("extractor exploded"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error_page() {
        let policy = policy("");
        let (bus, _seen) = recording_bus();
        let settings = settings();
        let crawler = PageCrawler::new(&policy, &TitleExtractor, &bus, &settings);
        let mut session = StubSession::new(0, "");

        let page = crawler.crawl(&mut session, "https://example.com/").await;
        assert_eq!(page.result.status, PageStatus::Error);
        assert_eq!(page.result.error.as_deref(), Some("Navigation failed"));
    }

    #[test]
    fn test_permission_rules() {
        let (bus, _seen) = recording_bus();
        let blocking = policy("User-agent: *\nDisallow: /");

        let mut ignore = settings();
        ignore.respect_robots = false;
        let crawler = PageCrawler::new(&blocking, &TitleExtractor, &bus, &ignore);
        assert!(crawler.is_permitted("https://example.com/anything"));

        let failed: RobotsPolicy = serde_json::from_value(serde_json::json!({
            "url": "https://example.com/robots.txt",
            "fetched_at": "2024-01-01T00:00:00Z",
            "allowed": true,
            "crawl_delay": null,
            "sitemaps": [],
            "outcome": "timeout",
            "note": "Request timeout",
        }))
        .unwrap();

        let open = settings();
        let crawler = PageCrawler::new(&failed, &TitleExtractor, &bus, &open);
        assert!(crawler.is_permitted("https://example.com/x"));

        let mut closed = settings();
        closed.fail_closed = true;
        let crawler = PageCrawler::new(&failed, &TitleExtractor, &bus, &closed);
        assert!(!crawler.is_permitted("https://example.com/x"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
