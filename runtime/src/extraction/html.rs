//! DOM-based extractor built on `scraper`.

use super::record::{ExtractedPage, Headings, Link, Links, MetaTags, OpenGraph, TwitterCard};
use super::PageExtractor;
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const MAX_HEADINGS_PER_LEVEL: usize = 100;
const MAX_HEADING_CHARS: usize = 500;
const MAX_LINKS: usize = 500;
const MAX_LINK_TEXT_CHARS: usize = 200;
const MAX_TEXT_CHARS: usize = 10_000;

const SKIPPED_HREF_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:"];
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracts meta tags, social cards, headings, links, JSON-LD and a text
/// preview from an HTML document.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PageExtractor for HtmlExtractor {
    fn extract(&self, html: &str, base_url: &str) -> Result<ExtractedPage> {
        let document = Html::parse_document(html);
        let metas = MetaIndex::collect(&document)?;

        Ok(ExtractedPage {
            meta: MetaTags {
                title: extract_title(&document)?,
                description: metas.get("description"),
                canonical: extract_canonical(&document)?,
                robots: metas.get("robots"),
                author: metas.get("author"),
                keywords: metas.get("keywords"),
            },
            open_graph: OpenGraph {
                title: metas.get("og:title"),
                description: metas.get("og:description"),
                image: metas.get("og:image"),
                url: metas.get("og:url"),
                og_type: metas.get("og:type"),
                site_name: metas.get("og:site_name"),
            },
            twitter_card: TwitterCard {
                card: metas.get("twitter:card"),
                title: metas.get("twitter:title"),
                description: metas.get("twitter:description"),
                image: metas.get("twitter:image"),
                site: metas.get("twitter:site"),
            },
            links: extract_links(&document, base_url)?,
            headings: extract_headings(&document)?,
            json_ld: extract_json_ld(&document)?,
            text_preview: extract_text_preview(&document),
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e:?}"))
}

/// `<meta>` contents keyed by lowercased `name` or `property`. First one wins.
struct MetaIndex(Vec<(String, String)>);

impl MetaIndex {
    fn collect(document: &Html) -> Result<Self> {
        let sel = selector("meta[content]")?;
        let entries = document
            .select(&sel)
            .filter_map(|el| {
                let el = el.value();
                let key = el.attr("name").or_else(|| el.attr("property"))?;
                let content = el.attr("content")?;
                Some((key.trim().to_ascii_lowercase(), content.trim().to_string()))
            })
            .collect();
        Ok(Self(entries))
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

fn extract_title(document: &Html) -> Result<Option<String>> {
    let sel = selector("title")?;
    Ok(document
        .select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty()))
}

fn extract_canonical(document: &Html) -> Result<Option<String>> {
    let sel = selector("link[rel][href]")?;
    Ok(document
        .select(&sel)
        .find(|el| {
            el.value().attr("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("canonical"))
            })
        })
        .and_then(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string()))
}

fn extract_headings(document: &Html) -> Result<Headings> {
    let mut headings = Headings::default();
    for level in 1..=6u8 {
        let sel = selector(&format!("h{level}"))?;
        let texts = document
            .select(&sel)
            .take(MAX_HEADINGS_PER_LEVEL)
            .map(|el| {
                let text = collapse_whitespace(&el.text().collect::<String>());
                if text.chars().count() > MAX_HEADING_CHARS {
                    format!("{}...", truncate_chars(&text, MAX_HEADING_CHARS))
                } else {
                    text
                }
            })
            .filter(|text| !text.is_empty());
        if let Some(slot) = headings.level_mut(level) {
            slot.extend(texts);
        }
    }
    Ok(headings)
}

fn extract_links(document: &Html, base_url: &str) -> Result<Links> {
    let sel = selector("a[href]")?;
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(_) => return Ok(Links::default()),
    };
    let base_host = host_with_port(&base);

    let mut internal = Vec::new();
    let mut external = Vec::new();
    let mut seen = HashSet::new();

    for el in document.select(&sel) {
        if internal.len() >= MAX_LINKS && external.len() >= MAX_LINKS {
            break;
        }
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || SKIPPED_HREF_PREFIXES.iter().any(|p| href.starts_with(p)) {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let host = host_with_port(&resolved);
        let key = format!("{}://{}{}", resolved.scheme(), host, resolved.path());
        if !seen.insert(key) {
            continue;
        }

        let text = collapse_whitespace(&el.text().collect::<String>());
        let link = Link {
            href: resolved.to_string(),
            text: truncate_chars(&text, MAX_LINK_TEXT_CHARS).to_string(),
        };

        if is_internal_host(&host, &base_host) {
            if internal.len() < MAX_LINKS {
                internal.push(link);
            }
        } else if external.len() < MAX_LINKS {
            external.push(link);
        }
    }

    Ok(Links::new(internal, external))
}

/// Same host, or one is a subdomain of the other.
fn is_internal_host(host: &str, base_host: &str) -> bool {
    host == base_host
        || host.ends_with(&format!(".{base_host}"))
        || base_host.ends_with(&format!(".{host}"))
}

fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

fn extract_json_ld(document: &Html) -> Result<Vec<serde_json::Value>> {
    let sel = selector("script[type]")?;
    let mut objects = Vec::new();
    for el in document.select(&sel) {
        let is_json_ld = el
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"));
        if !is_json_ld {
            continue;
        }
        let raw = el.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => objects.extend(items),
            Ok(value) => objects.push(value),
            Err(_) => continue,
        }
    }
    Ok(objects)
}

fn extract_text_preview(document: &Html) -> String {
    let root = document.root_element();
    let mut pieces: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            ElementRef::wrap(a).is_some_and(|el| NON_CONTENT_TAGS.contains(&el.value().name()))
        });
        if !hidden {
            pieces.push(&**text);
        }
    }
    let text = collapse_whitespace(&pieces.join(" "));
    truncate_chars(&text, MAX_TEXT_CHARS).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
