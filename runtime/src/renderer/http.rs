//! HTTP-only page fetcher: no script execution and no screenshots.

use super::{FetchSession, NavigationResult, PageFetcher};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use std::time::{Duration, Instant};
use tracing::debug;

const MAX_REDIRECTS: usize = 10;

/// Fetches pages with a plain HTTP client.
pub struct HttpPageFetcher {
    user_agent: String,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self) -> Result<Box<dyn FetchSession>> {
        // Redirects are followed by hand so the chain can be recorded.
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("building page client")?;

        Ok(Box::new(HttpSession {
            client,
            body: None,
        }))
    }
}

struct HttpSession {
    client: reqwest::Client,
    body: Option<String>,
}

impl HttpSession {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
        chain: &mut Vec<String>,
    ) -> Result<(String, u16)> {
        let mut current = url::Url::parse(url).with_context(|| format!("parsing {url}"))?;

        for _ in 0..=MAX_REDIRECTS {
            let resp = self
                .client
                .get(current.clone())
                .timeout(timeout)
                .send()
                .await?;
            let status = resp.status();

            if status.is_redirection() {
                if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                    let next = current
                        .join(location)
                        .with_context(|| format!("bad redirect target {location}"))?;
                    chain.push(current.to_string());
                    current = next;
                    continue;
                }
            }

            let body = resp.text().await?;
            self.body = Some(body);
            return Ok((current.to_string(), status.as_u16()));
        }

        bail!("too many redirects from {url}")
    }
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn fetch_document(&mut self, url: &str, timeout_ms: u64) -> NavigationResult {
        let start = Instant::now();
        let mut chain = Vec::new();
        self.body = None;

        match self
            .navigate(url, Duration::from_millis(timeout_ms), &mut chain)
            .await
        {
            Ok((final_url, status)) => NavigationResult {
                final_url,
                status,
                redirect_chain: chain,
                load_time_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => {
                debug!("navigation to {url} failed: {e:#}");
                NavigationResult::failed(url, start.elapsed().as_millis() as u64)
            }
        }
    }

    async fn content(&mut self) -> Result<String> {
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => bail!("no document loaded"),
        }
    }

    async fn screenshot(&mut self) -> Option<Vec<u8>> {
        None
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
