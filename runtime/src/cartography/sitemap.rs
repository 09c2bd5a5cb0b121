//! Sitemap parsing and breadth-first discovery through sitemap indexes.

use crate::acquisition::http_client::HttpClient;
use quick_xml::events::Event;
use quick_xml::name::QName;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// A page URL listed in a sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    /// Dropped (not the entry) when it does not parse as a number.
    pub priority: Option<f32>,
}

/// Contents of one sitemap document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSitemap {
    /// Page entries; always empty for a sitemap index.
    pub entries: Vec<SitemapEntry>,
    /// Nested sitemap URLs; only filled for a sitemap index.
    pub nested: Vec<String>,
}

/// Which block the parser is currently inside.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Block {
    None,
    Url,
    Sitemap,
}

#[derive(Default)]
struct EntryFields {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl EntryFields {
    fn set(&mut self, tag: &str, text: String) {
        let slot = match tag {
            "loc" => &mut self.loc,
            "lastmod" => &mut self.lastmod,
            "changefreq" => &mut self.changefreq,
            "priority" => &mut self.priority,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    fn into_entry(self) -> Option<SitemapEntry> {
        Some(SitemapEntry {
            loc: self.loc?,
            lastmod: self.lastmod,
            changefreq: self.changefreq,
            priority: self.priority.and_then(|p| p.parse::<f32>().ok()),
        })
    }
}

/// Parse a sitemap or sitemap index document.
///
/// Parsing stops quietly at the first XML error; whatever was collected
/// before it is returned. `<url>` blocks without `<loc>` are dropped.
pub fn parse_sitemap(xml: &str) -> ParsedSitemap {
    let mut parsed = ParsedSitemap::default();
    let mut is_index = false;
    let mut block = Block::None;
    let mut fields = EntryFields::default();
    let mut current_tag = String::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = sitemap_tag(e.name());
                match name.as_str() {
                    "sitemapindex" => is_index = true,
                    "url" => {
                        block = Block::Url;
                        fields = EntryFields::default();
                    }
                    "sitemap" => {
                        block = Block::Sitemap;
                        fields = EntryFields::default();
                    }
                    _ => {}
                }
                current_tag = name;
            }
            Ok(Event::Text(ref e)) => {
                if block != Block::None {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        fields.set(&current_tag, text);
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if block != Block::None {
                    let text = String::from_utf8_lossy(e).trim().to_string();
                    if !text.is_empty() {
                        fields.set(&current_tag, text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = sitemap_tag(e.name());
                match (name.as_str(), block) {
                    ("url", Block::Url) => {
                        if let Some(entry) = std::mem::take(&mut fields).into_entry() {
                            parsed.entries.push(entry);
                        }
                        block = Block::None;
                    }
                    ("sitemap", Block::Sitemap) => {
                        if let Some(loc) = std::mem::take(&mut fields).loc {
                            parsed.nested.push(loc);
                        }
                        block = Block::None;
                    }
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("sitemap parse stopped at byte {}: {e}", reader.buffer_position());
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if is_index {
        parsed.entries.clear();
    } else {
        parsed.nested.clear();
    }

    parsed
}

/// Lowercased tag name, empty for prefixed extension elements such as
/// `<image:loc>` so their text never lands in a sitemap field.
fn sitemap_tag(name: QName<'_>) -> String {
    if name.prefix().is_some() {
        return String::new();
    }
    String::from_utf8_lossy(name.local_name().as_ref()).to_lowercase()
}

/// Fetch one sitemap document. Any failure yields `None`.
async fn fetch_sitemap(client: &HttpClient, url: &str, timeout_ms: u64) -> Option<String> {
    match client.get(url, timeout_ms).await {
        Ok(resp) if resp.status == 200 => Some(resp.body),
        Ok(resp) => {
            debug!("sitemap {url} returned HTTP {}", resp.status);
            None
        }
        Err(e) => {
            debug!("sitemap {url} failed: {e}");
            None
        }
    }
}

/// Discover page URLs from seed sitemaps, following nested indexes.
///
/// The work queue is FIFO and each document URL is fetched at most once, so
/// indexes that reference each other cannot loop. Entries keep document
/// dequeue order, then source order. Collection stops as soon as
/// `max_urls` entries are held; queued documents are then never fetched.
/// Failed documents contribute nothing.
pub async fn discover_all(
    client: &HttpClient,
    origin: &str,
    seed_urls: &[String],
    max_urls: usize,
    timeout_ms: u64,
) -> Vec<SitemapEntry> {
    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut processed: HashSet<String> = HashSet::new();
    let mut pending: VecDeque<String> = seed_urls.iter().cloned().collect();

    while entries.len() < max_urls {
        let Some(sitemap_url) = pending.pop_front() else {
            break;
        };

        if !processed.insert(sitemap_url.clone()) {
            continue;
        }

        let Some(content) = fetch_sitemap(client, &sitemap_url, timeout_ms).await else {
            continue;
        };

        let parsed = parse_sitemap(&content);
        let remaining = max_urls - entries.len();
        entries.extend(parsed.entries.into_iter().take(remaining));

        for nested in parsed.nested {
            if !processed.contains(&nested) {
                pending.push_back(nested);
            }
        }
    }

    info!(
        "discovered {} URLs for {origin} from {} sitemap documents",
        entries.len(),
        processed.len()
    );

    entries
}
