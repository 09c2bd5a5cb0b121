//! Audit reports: data model, Markdown rendering, and the artifact writer.

pub mod markdown;
pub mod types;
pub mod writer;

pub use types::{
    ContentSummary, DiscoveryInfo, PageArtifacts, PageDurations, PageReport, PageResult,
    PageStatus, PerformanceSummary, SeoSummary, SiteArtifacts, SiteDurations, SiteInfo,
    SiteReport, SiteSummary, TargetInfo, REPORT_VERSION,
};
pub use writer::{ReportFormat, ReportWriter, Screenshot};
