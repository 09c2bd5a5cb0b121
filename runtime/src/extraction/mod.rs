//! Turning raw HTML into a structured page record.

pub mod html;
pub mod record;

pub use html::HtmlExtractor;
pub use record::{ExtractedPage, Headings, Link, Links, MetaTags, OpenGraph, TwitterCard};

/// Pure HTML-to-record extraction.
///
/// Implementations must tolerate malformed markup. An `Err` (or a panic)
/// is treated by the pipeline as a failure of that page only.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &str) -> anyhow::Result<ExtractedPage>;
}
