//! Report data model for site and single-page audits.

use crate::cartography::robots::RobotsPolicy;
use crate::extraction::ExtractedPage;
use crate::renderer::NavigationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0.0";

/// Outcome of one crawled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Success,
    Blocked,
    Error,
}

/// One page of a site audit.
///
/// `extracted` is present exactly when `status` is `Success`; `error` is
/// present for the other two statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub status: PageStatus,
    pub load_time_ms: u64,
    pub extracted: Option<ExtractedPage>,
    pub error: Option<String>,
}

impl PageResult {
    pub fn success(url: impl Into<String>, load_time_ms: u64, extracted: ExtractedPage) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::Success,
            load_time_ms,
            extracted: Some(extracted),
            error: None,
        }
    }

    pub fn blocked(url: impl Into<String>, load_time_ms: u64) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::Blocked,
            load_time_ms,
            extracted: None,
            error: Some("Blocked by robots.txt".to_string()),
        }
    }

    pub fn failed(url: impl Into<String>, load_time_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::Error,
            load_time_ms,
            extracted: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PageStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub input_url: String,
    pub origin: String,
    pub hostname: String,
}

/// What the discovery phase produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// False when sitemap discovery came back empty and the run fell back
    /// to the target alone.
    pub discovered: bool,
    pub total_urls: usize,
    /// Sitemap documents used as seeds.
    pub sitemap_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoSummary {
    pub pages_with_title: usize,
    pub pages_with_description: usize,
    pub pages_with_canonical: usize,
    pub pages_with_h1: usize,
    pub pages_with_opengraph: usize,
    pub pages_with_twitter_card: usize,
    pub pages_with_jsonld: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub total_internal_links: usize,
    pub total_external_links: usize,
    pub avg_internal_links_per_page: usize,
    pub avg_external_links_per_page: usize,
    /// Heading totals for levels 1 to 6.
    pub headings_per_level: [usize; 6],
    pub total_h1_tags: usize,
    pub total_h2_tags: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub avg_load_time_ms: u64,
    pub fastest_page_ms: u64,
    pub slowest_page_ms: u64,
}

/// Aggregates over a site audit. Signal counts and averages consider
/// successful pages only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub total_pages: usize,
    pub successful_pages: usize,
    pub blocked_pages: usize,
    pub error_pages: usize,
    pub seo: SeoSummary,
    pub content: ContentSummary,
    pub performance: PerformanceSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDurations {
    pub total_ms: u64,
    pub robots_ms: u64,
    pub sitemap_ms: u64,
    pub crawl_ms: u64,
}

/// Files written for a site audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteArtifacts {
    pub directory: Option<String>,
    pub json_path: Option<String>,
    pub markdown_path: Option<String>,
    pub page_paths: Vec<String>,
    pub screenshot_paths: Vec<String>,
    pub robots_path: Option<String>,
}

/// Result of a site audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub site: SiteInfo,
    pub robots: RobotsPolicy,
    pub sitemap: DiscoveryInfo,
    /// Discovery order, regardless of completion order.
    pub pages: Vec<PageResult>,
    pub summary: SiteSummary,
    pub duration: SiteDurations,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Set when a stop signal cut the crawl short.
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub artifacts: SiteArtifacts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub input_url: String,
    pub normalized_url: String,
    pub final_url: String,
    /// HTTP status of the navigation, 0 when none happened.
    pub status: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageArtifacts {
    pub html_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub robots_path: Option<String>,
    pub json_path: Option<String>,
    pub markdown_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDurations {
    pub total_ms: u64,
    pub robots_ms: u64,
    pub navigation_ms: u64,
    pub extraction_ms: u64,
}

/// Result of a single-page audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub target: TargetInfo,
    pub robots: RobotsPolicy,
    pub navigation: Option<NavigationResult>,
    pub extracted: Option<ExtractedPage>,
    #[serde(default)]
    pub artifacts: PageArtifacts,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration: PageDurations,
}
