//! Cartography: robots.txt policy, sitemap discovery, pacing, and the
//! per-page crawl step.

pub mod crawler;
pub mod rate_limiter;
pub mod robots;
pub mod sitemap;
