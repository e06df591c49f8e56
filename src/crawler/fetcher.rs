//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by crawl tasks:
//! - Building the shared HTTP client with the configured user agent
//! - GET requests returning the raw page body
//! - Classifying failures into malformed URLs and fetch errors

use crate::config::UserAgentConfig;
use crate::GleanError;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested (base for resolving relative references)
    pub url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Raw page body
    pub body: Vec<u8>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Optional whole-request timeout; `None` waits indefinitely
///
/// # Example
///
/// ```no_run
/// use sumi_glean::config::UserAgentConfig;
/// use sumi_glean::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), None).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Option<Duration>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.header_value())
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Parses a page URL, accepting only HTTP(S)
pub fn parse_page_url(url: &str) -> Result<Url, GleanError> {
    let parsed = Url::parse(url.trim()).map_err(|e| GleanError::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(GleanError::MalformedUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

/// Fetches a single page
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Unparsable URL or non-HTTP(S) scheme | `MalformedUrl` |
/// | Timeout | `Fetch` ("Request timeout") |
/// | Connection refused / DNS failure | `Fetch` ("Connection failed") |
/// | Body read failure | `Fetch` |
///
/// Any HTTP status is a successful fetch; error pages are returned with their
/// body and status code like any other page. No retries are attempted.
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, GleanError> {
    let parsed = parse_page_url(url)?;

    let response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| fetch_error(url, &e))?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| fetch_error(url, &e))?;

    tracing::trace!("Fetched {} (HTTP {}, {} bytes)", url, status.as_u16(), body.len());

    Ok(FetchedPage {
        url: parsed,
        status_code: status.as_u16(),
        body: body.to_vec(),
    })
}

fn fetch_error(url: &str, error: &reqwest::Error) -> GleanError {
    let message = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else {
        error.to_string()
    };

    GleanError::Fetch {
        url: url.to_string(),
        message,
    }
}
