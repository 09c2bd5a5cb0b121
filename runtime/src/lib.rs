//! Robots-compliant site auditing.
//!
//! [`pipeline::SiteAudit`] fetches a site's robots.txt, discovers pages
//! from its sitemaps, crawls them one by one with rate limiting and per-page
//! isolation, and aggregates the results into a [`report::SiteReport`].
//! [`pipeline::SingleAudit`] does the same for one URL. Progress is
//! published on an [`events::EventBus`].

pub mod acquisition;
pub mod audit;
pub mod cartography;
pub mod cli;
pub mod error;
pub mod events;
pub mod extraction;
pub mod pipeline;
pub mod renderer;
pub mod report;
