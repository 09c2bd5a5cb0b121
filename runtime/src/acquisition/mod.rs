//! Plain HTTP acquisition shared by robots.txt and sitemap fetching.

pub mod http_client;
