//! Page fetching contract.
//!
//! A [`PageFetcher`] opens scoped [`FetchSession`]s. A session navigates to
//! one document at a time and exposes the last document's content and an
//! optional screenshot. Sessions must be closed by the caller.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationResult {
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status, 0 when the transport failed.
    pub status: u16,
    /// URLs that redirected, in order, excluding the final one.
    pub redirect_chain: Vec<String>,
    pub load_time_ms: u64,
}

impl NavigationResult {
    /// A failed navigation: status 0 with whatever timing was measured.
    pub fn failed(url: &str, load_time_ms: u64) -> Self {
        Self {
            final_url: url.to_string(),
            status: 0,
            redirect_chain: Vec::new(),
            load_time_ms,
        }
    }
}

/// Factory for fetch sessions.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Identifier announced in `navigate:start` events.
    fn name(&self) -> &str;

    /// Acquire a session. Every opened session must be closed.
    async fn open(&self) -> Result<Box<dyn FetchSession>>;
}

/// A live fetching session.
#[async_trait]
pub trait FetchSession: Send {
    /// Navigate to `url`. Never fails: transport errors come back as
    /// status 0.
    async fn fetch_document(&mut self, url: &str, timeout_ms: u64) -> NavigationResult;

    /// Raw text of the last fetched document.
    async fn content(&mut self) -> Result<String>;

    /// PNG screenshot of the last document, `None` if unsupported or failed.
    async fn screenshot(&mut self) -> Option<Vec<u8>>;

    /// Release the session.
    async fn close(self: Box<Self>) -> Result<()>;
}
