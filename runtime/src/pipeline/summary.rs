//! Site summary aggregation.

use crate::extraction::ExtractedPage;
use crate::report::{
    ContentSummary, PageResult, PageStatus, PerformanceSummary, SeoSummary, SiteSummary,
};

/// Running totals over a page list, built in one pass.
#[derive(Debug, Default)]
struct Tally {
    total: usize,
    blocked: usize,
    errors: usize,
    successful: usize,
    seo: SeoSummary,
    internal_links: usize,
    external_links: usize,
    headings: [usize; 6],
    load_total: u64,
    fastest: Option<u64>,
    slowest: Option<u64>,
}

impl Tally {
    fn add(mut self, page: &PageResult) -> Self {
        self.total += 1;
        match (page.status, page.extracted.as_ref()) {
            (PageStatus::Blocked, _) => self.blocked += 1,
            (PageStatus::Error, _) => self.errors += 1,
            (PageStatus::Success, Some(extracted)) => self.add_success(page.load_time_ms, extracted),
            // Not constructible through PageResult's constructors.
            (PageStatus::Success, None) => {}
        }
        self
    }

    fn add_success(&mut self, load_time_ms: u64, e: &ExtractedPage) {
        self.successful += 1;

        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        let seo = &mut self.seo;
        seo.pages_with_title += present(&e.meta.title) as usize;
        seo.pages_with_description += present(&e.meta.description) as usize;
        seo.pages_with_canonical += present(&e.meta.canonical) as usize;
        seo.pages_with_h1 += !e.headings.h1.is_empty() as usize;
        seo.pages_with_opengraph += present(&e.open_graph.title) as usize;
        seo.pages_with_twitter_card += present(&e.twitter_card.card) as usize;
        seo.pages_with_jsonld += !e.json_ld.is_empty() as usize;

        self.internal_links += e.links.internal_count;
        self.external_links += e.links.external_count;
        for (level, total) in self.headings.iter_mut().enumerate() {
            *total += e.headings.level(level as u8 + 1).len();
        }

        self.load_total += load_time_ms;
        self.fastest = Some(self.fastest.map_or(load_time_ms, |f| f.min(load_time_ms)));
        self.slowest = Some(self.slowest.map_or(load_time_ms, |s| s.max(load_time_ms)));
    }

    fn finish(self) -> SiteSummary {
        let per_page = |n: usize| n.checked_div(self.successful).unwrap_or(0);
        let avg_load = self
            .load_total
            .checked_div(self.successful as u64)
            .unwrap_or(0);

        SiteSummary {
            total_pages: self.total,
            successful_pages: self.successful,
            blocked_pages: self.blocked,
            error_pages: self.errors,
            content: ContentSummary {
                total_internal_links: self.internal_links,
                total_external_links: self.external_links,
                avg_internal_links_per_page: per_page(self.internal_links),
                avg_external_links_per_page: per_page(self.external_links),
                headings_per_level: self.headings,
                total_h1_tags: self.headings[0],
                total_h2_tags: self.headings[1],
            },
            performance: PerformanceSummary {
                avg_load_time_ms: avg_load,
                fastest_page_ms: self.fastest.unwrap_or(0),
                slowest_page_ms: self.slowest.unwrap_or(0),
            },
            seo: self.seo,
        }
    }
}

/// Summarize pages. Averages use integer division and are 0 when no page
/// succeeded.
pub fn summarize(pages: &[PageResult]) -> SiteSummary {
    pages.iter().fold(Tally::default(), Tally::add).finish()
}
