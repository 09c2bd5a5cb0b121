//! Single-page audit.

use super::config::AuditConfig;
use super::target::Target;
use super::{build_client, elapsed_ms, emit_start, fail_closed_warning, fetch_policy};
use crate::cartography::crawler::panic_message;
use crate::error::Result;
use crate::events::{EventBus, EventKind};
use crate::extraction::{ExtractedPage, HtmlExtractor, PageExtractor};
use crate::renderer::http::HttpPageFetcher;
use crate::renderer::{FetchSession, NavigationResult, PageFetcher};
use crate::report::{
    PageArtifacts, PageDurations, PageReport, ReportWriter, TargetInfo, REPORT_VERSION,
};
use anyhow::Context;
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const BLOCKED_WARNING: &str = "Page blocked by robots.txt - skipping navigation";

const EXTRACTORS: [&str; 7] = ["meta", "opengraph", "twitter", "links", "headings", "jsonld", "text"];

/// Audits exactly one URL and writes one report.
pub struct SingleAudit {
    config: AuditConfig,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn PageExtractor>,
    events: EventBus,
}

/// What a visit captured, filled in as far as it got.
#[derive(Default)]
struct Capture {
    navigation: Option<NavigationResult>,
    html: Option<String>,
    screenshot: Option<Vec<u8>>,
    extracted: Option<ExtractedPage>,
    navigation_ms: u64,
    extraction_ms: u64,
}

impl SingleAudit {
    pub fn new(config: AuditConfig) -> Self {
        let fetcher = Arc::new(HttpPageFetcher::new(&config.user_agent));
        Self {
            config,
            fetcher,
            extractor: Arc::new(HtmlExtractor::new()),
            events: EventBus::new(),
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

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Audit `url`. Only an unusable URL or HTTP client setup is an error;
    /// navigation and extraction failures are recorded in the report.
    pub async fn visit(&self, url: &str) -> Result<PageReport> {
        let started = Instant::now();
        let target = Target::parse(url)?;
        let client = build_client(&self.config)?;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        emit_start(&self.events, &target, &self.config);
        info!("visiting {}", target.url);

        let (policy, robots_ms) = fetch_policy(&self.events, &client, &target, &self.config).await;

        let fail_closed =
            self.config.respect_robots && self.config.robots_fail_closed && policy.fetch_failed();
        if fail_closed {
            warnings.push(fail_closed_warning(&policy));
        }
        let permitted = !self.config.respect_robots
            || (!fail_closed && policy.is_allowed(&target.url, &self.config.user_agent));

        let mut capture = Capture::default();
        if permitted {
            if let Err(message) = self.capture(&target.url, &mut capture).await {
                warn!("visit of {} failed: {message}", target.url);
                self.events.emit(EventKind::Error, json!({ "message": message }));
                errors.push(format!("Navigation/extraction error: {message}"));
            }
        } else {
            warnings.push(BLOCKED_WARNING.to_string());
        }

        if let Some(nav) = &capture.navigation {
            if nav.status >= 400 {
                warnings.push(format!("Page returned HTTP {}", nav.status));
            }
        }

        let mut report = PageReport {
            version: REPORT_VERSION.to_string(),
            timestamp: Utc::now(),
            target: TargetInfo {
                input_url: target.input.clone(),
                normalized_url: target.url.clone(),
                final_url: capture
                    .navigation
                    .as_ref()
                    .map_or_else(|| target.url.clone(), |n| n.final_url.clone()),
                status: capture.navigation.as_ref().map_or(0, |n| n.status),
            },
            robots: policy,
            navigation: capture.navigation.take(),
            extracted: capture.extracted.take(),
            artifacts: PageArtifacts::default(),
            errors,
            warnings,
            duration: PageDurations {
                total_ms: elapsed_ms(started),
                robots_ms,
                navigation_ms: capture.navigation_ms,
                extraction_ms: capture.extraction_ms,
            },
        };

        self.persist(&mut report, &target, &capture);

        self.events
            .emit(EventKind::PipelineEnd, json!({ "summary": report }));

        Ok(report)
    }

    /// Open a session, capture the page and close the session again.
    /// Errors and panics come back as a message.
    async fn capture(&self, url: &str, capture: &mut Capture) -> std::result::Result<(), String> {
        let mut session = self
            .fetcher
            .open()
            .await
            .map_err(|e| format!("{e:#}"))?;

        let outcome = AssertUnwindSafe(self.navigate_and_extract(session.as_mut(), url, capture))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!("failed to close fetch session: {e:#}");
        }

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => Err(format!("panic: {}", panic_message(payload.as_ref()))),
        }
    }

    async fn navigate_and_extract(
        &self,
        session: &mut dyn FetchSession,
        url: &str,
        capture: &mut Capture,
    ) -> anyhow::Result<()> {
        let driver = self
            .config
            .driver
            .clone()
            .unwrap_or_else(|| self.fetcher.name().to_string());
        self.events
            .emit(EventKind::NavigateStart, json!({ "url": url, "driver": driver }));

        let nav = session.fetch_document(url, self.config.timeout).await;
        capture.navigation_ms = nav.load_time_ms;
        self.events.emit(
            EventKind::NavigateComplete,
            json!({
                "final_url": nav.final_url,
                "status": nav.status,
                "load_time_ms": nav.load_time_ms,
            }),
        );
        let failed = nav.status == 0;
        let final_url = nav.final_url.clone();
        capture.navigation = Some(nav);
        if failed {
            anyhow::bail!("navigation to {url} failed");
        }

        self.events
            .emit(EventKind::ExtractStart, json!({ "extractors": EXTRACTORS }));
        let extract_start = Instant::now();

        let html = session.content().await.context("reading page content")?;
        if self.config.save_screenshot {
            capture.screenshot = session.screenshot().await;
        }
        let extracted = self
            .extractor
            .extract(&html, &final_url)
            .context("extracting page data")?;
        capture.html = Some(html);
        capture.extraction_ms = elapsed_ms(extract_start);

        self.events
            .emit(EventKind::ExtractComplete, json!({ "extracted": extracted }));
        capture.extracted = Some(extracted);
        Ok(())
    }

    fn persist(&self, report: &mut PageReport, target: &Target, capture: &Capture) {
        let Some(output_dir) = &self.config.output_dir else {
            return;
        };
        let writer = ReportWriter::new(output_dir, self.config.format, &self.events);
        let html = capture.html.as_deref().filter(|_| self.config.save_html);
        let screenshot = capture
            .screenshot
            .as_deref()
            .filter(|_| self.config.save_screenshot);
        let robots_raw = if self.config.save_robots {
            report.robots.raw.clone()
        } else {
            None
        };

        if let Err(e) = writer.write_page(
            report,
            &target.hostname,
            html,
            screenshot,
            robots_raw.as_deref(),
        ) {
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
    use crate::events::Event;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedFetcher {
        status: u16,
        body: &'static str,
    }

    struct FixedSession {
        status: u16,
        body: &'static str,
        last: Option<String>,
    }

    #[async_trait]
    impl PageFetcher for FixedFetcher {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn open(&self) -> anyhow::Result<Box<dyn FetchSession>> {
            Ok(Box::new(FixedSession {
                status: self.status,
                body: self.body,
                last: None,
            }))
        }
    }

    #[async_trait]
    impl FetchSession for FixedSession {
        async fn fetch_document(&mut self, url: &str, _timeout_ms: u64) -> NavigationResult {
            self.last = Some(url.to_string());
            NavigationResult {
                final_url: url.to_string(),
                status: self.status,
                redirect_chain: Vec::new(),
                load_time_ms: 7,
            }
        }

        async fn content(&mut self) -> anyhow::Result<String> {
            Ok(self.body.to_string())
        }

        async fn screenshot(&mut self) -> Option<Vec<u8>> {
            Some(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn site(robots: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        server
    }

    fn config() -> AuditConfig {
        AuditConfig {
            output_dir: None,
            user_agent: "WebAuditBot".into(),
            ..AuditConfig::default()
        }
    }

    fn recorder(audit: &mut SingleAudit) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        audit.events_mut().on_any(move |e: &Event| -> anyhow::Result<()> {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        seen
    }

    #[tokio::test]
    async fn test_visit_extracts_page() {
        let server = site("User-agent: *\nDisallow: /private").await;
        let mut audit = SingleAudit::new(config()).with_fetcher(Arc::new(FixedFetcher {
            status: 200,
            body: "<html><head><title>Home</title></head><body><h1>Hi</h1></body></html>",
        }));
        let seen = recorder(&mut audit);

        let report = audit.visit(&format!("{}/", server.uri())).await.unwrap();

        assert_eq!(report.target.status, 200);
        assert!(report.errors.is_empty());
        let extracted = report.extracted.unwrap();
        assert_eq!(extracted.meta.title.as_deref(), Some("Home"));
        assert_eq!(extracted.headings.h1, vec!["Hi".to_string()]);
        assert_eq!(report.duration.navigation_ms, 7);

        let kinds: Vec<&str> = seen.lock().unwrap().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "pipeline:start",
                "robots:fetch",
                "robots:result",
                "navigate:start",
                "navigate:complete",
                "extract:start",
                "extract:complete",
                "pipeline:end",
            ]
        );
    }

    #[tokio::test]
    async fn test_blocked_page_skips_navigation() {
        let server = site("User-agent: *\nDisallow: /private").await;
        let mut audit = SingleAudit::new(config()).with_fetcher(Arc::new(FixedFetcher {
            status: 200,
            body: "<title>secret</title>",
        }));
        let seen = recorder(&mut audit);

        let report = audit
            .visit(&format!("{}/private/page", server.uri()))
            .await
            .unwrap();

        assert_eq!(report.warnings, vec![BLOCKED_WARNING.to_string()]);
        assert!(report.navigation.is_none());
        assert!(report.extracted.is_none());
        assert_eq!(report.target.status, 0);
        assert!(!seen
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.kind == EventKind::NavigateStart));
    }

    #[tokio::test]
    async fn test_ignoring_robots_visits_disallowed_page() {
        let server = site("User-agent: *\nDisallow: /").await;
        let audit = SingleAudit::new(AuditConfig {
            respect_robots: false,
            ..config()
        })
        .with_fetcher(Arc::new(FixedFetcher {
            status: 200,
            body: "<title>open</title>",
        }));

        let report = audit.visit(&server.uri()).await.unwrap();
        assert!(report.extracted.is_some());
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_navigation_is_recorded() {
        let server = site("").await;
        let mut audit = SingleAudit::new(config()).with_fetcher(Arc::new(FixedFetcher {
            status: 0,
            body: "",
        }));
        let seen = recorder(&mut audit);

        let report = audit.visit(&server.uri()).await.unwrap();

        assert_eq!(report.target.status, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Navigation/extraction error:"));
        assert!(report.extracted.is_none());
        assert!(seen.lock().unwrap().iter().any(|e| e.kind == EventKind::Error));
    }

    #[tokio::test]
    async fn test_http_error_page_is_still_extracted() {
        let server = site("").await;
        let audit = SingleAudit::new(config()).with_fetcher(Arc::new(FixedFetcher {
            status: 404,
            body: "<title>Not Found</title>",
        }));

        let report = audit.visit(&server.uri()).await.unwrap();
        assert_eq!(report.target.status, 404);
        assert_eq!(
            report.extracted.unwrap().meta.title.as_deref(),
            Some("Not Found")
        );
        assert_eq!(report.warnings, vec!["Page returned HTTP 404".to_string()]);
    }

    #[tokio::test]
    async fn test_artifacts_are_written() {
        let server = site("User-agent: *\nAllow: /").await;
        let dir = tempfile::tempdir().unwrap();
        let audit = SingleAudit::new(
            AuditConfig {
                output_dir: Some(dir.path().to_path_buf()),
                ..config()
            }
            .save_all(),
        )
        .with_fetcher(Arc::new(FixedFetcher {
            status: 200,
            body: "<title>Saved</title>",
        }));

        let report = audit.visit(&server.uri()).await.unwrap();

        let artifacts = &report.artifacts;
        for path in [
            &artifacts.html_path,
            &artifacts.screenshot_path,
            &artifacts.robots_path,
            &artifacts.json_path,
            &artifacts.markdown_path,
        ] {
            let path = path.as_deref().expect("artifact path");
            assert!(std::path::Path::new(path).exists(), "{path} missing");
        }
        let robots = std::fs::read_to_string(artifacts.robots_path.as_deref().unwrap()).unwrap();
        assert!(robots.contains("Allow: /"));
    }
}
