//! Crawler module for page fetching and image extraction
//!
//! This module contains the crawling logic executed by jobs:
//! - HTTP fetching
//! - HTML parsing for images and child links
//! - The crawl task that walks seeds and their immediate children

mod fetcher;
mod parser;
mod task;

pub use fetcher::{build_http_client, fetch_page, parse_page_url, FetchedPage};
pub use parser::{parse_html, ParsedPage};
pub use task::{CrawlOptions, CrawlTask};
