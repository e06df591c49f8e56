//! HTML parser for extracting images and child links
//!
//! This module handles parsing page content to extract:
//! - Image references (from `<img src>` tags)
//! - Links to child pages (from `<a href>` tags)
//!
//! Both are resolved to absolute URLs against the page's own URL.

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Image URLs in document order (absolute, duplicates kept)
    pub images: Vec<String>,

    /// Child page links in document order (absolute HTTP(S) only)
    pub links: Vec<String>,
}

/// Parses page content and extracts images and links
///
/// # Extraction Rules
///
/// **Images:** every `<img>` with a non-empty `src`, resolved against
/// `base_url`. Duplicates are kept.
///
/// **Links:** every `<a href>`, resolved against `base_url`, excluding
/// `javascript:`, `mailto:`, `tel:`, `data:`, fragment-only hrefs and
/// anything that does not resolve to HTTP(S).
///
/// # Example
///
/// ```
/// use sumi_glean::crawler::parse_html;
/// use url::Url;
///
/// let html = br#"<img src="/x.png"><a href="/child">Child</a>"#;
/// let base = Url::parse("http://a.test/").unwrap();
/// let parsed = parse_html(html, &base);
/// assert_eq!(parsed.images, vec!["http://a.test/x.png"]);
/// assert_eq!(parsed.links, vec!["http://a.test/child"]);
/// ```
pub fn parse_html(body: &[u8], base_url: &Url) -> ParsedPage {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    ParsedPage {
        images: extract_images(&document, base_url),
        links: extract_links(&document, base_url),
    }
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(img_selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&img_selector)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .filter_map(|src| base_url.join(src).ok())
        .map(|url| url.to_string())
        .collect()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
