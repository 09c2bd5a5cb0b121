//! Structured page record produced by a [`PageExtractor`](super::PageExtractor).

use serde::{Deserialize, Serialize};

/// Everything extracted from one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedPage {
    pub meta: MetaTags,
    pub open_graph: OpenGraph,
    pub twitter_card: TwitterCard,
    pub links: Links,
    pub headings: Headings,
    pub json_ld: Vec<serde_json::Value>,
    pub text_preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaTags {
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenGraph {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub og_type: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterCard {
    pub card: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site: Option<String>,
}

/// A resolved anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Links {
    pub internal: Vec<Link>,
    pub external: Vec<Link>,
    pub internal_count: usize,
    pub external_count: usize,
}

impl Links {
    pub fn new(internal: Vec<Link>, external: Vec<Link>) -> Self {
        Self {
            internal_count: internal.len(),
            external_count: external.len(),
            internal,
            external,
        }
    }
}

/// Heading texts by level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub h4: Vec<String>,
    pub h5: Vec<String>,
    pub h6: Vec<String>,
}

impl Headings {
    /// Headings of level 1..=6. Other levels yield an empty slice.
    pub fn level(&self, level: u8) -> &[String] {
        match level {
            1 => &self.h1,
            2 => &self.h2,
            3 => &self.h3,
            4 => &self.h4,
            5 => &self.h5,
            6 => &self.h6,
            _ => &[],
        }
    }

    pub fn level_mut(&mut self, level: u8) -> Option<&mut Vec<String>> {
        match level {
            1 => Some(&mut self.h1),
            2 => Some(&mut self.h2),
            3 => Some(&mut self.h3),
            4 => Some(&mut self.h4),
            5 => Some(&mut self.h5),
            6 => Some(&mut self.h6),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_graph_type_field_name() {
        let og = OpenGraph {
            og_type: Some("website".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&og).unwrap();
        assert_eq!(json["type"], "website");
    }

    #[test]
    fn test_partial_record_deserializes_with_defaults() {
        let page: ExtractedPage =
            serde_json::from_str(r#"{"meta":{"title":"Home"},"headings":{"h1":["Hi"]}}"#).unwrap();
        assert_eq!(page.meta.title.as_deref(), Some("Home"));
        assert_eq!(page.headings.level(1), ["Hi".to_string()]);
        assert!(page.headings.level(7).is_empty());
        assert_eq!(page.links.internal_count, 0);
    }

    #[test]
    fn test_links_counts_follow_lists() {
        let links = Links::new(
            vec![Link {
                href: "https://a.example/".into(),
                text: "A".into(),
            }],
            Vec::new(),
        );
        assert_eq!(links.internal_count, 1);
        assert_eq!(links.external_count, 0);
    }
}
