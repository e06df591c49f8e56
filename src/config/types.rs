use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration structure for Sumi-Glean
///
/// Every section is optional; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the API listens on
    #[serde(rename = "bind-address")]
    pub bind_address: SocketAddr,

    /// Whether to emit a tracing span per HTTP request
    #[serde(rename = "request-logging")]
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_logging: true,
        }
    }
}

/// Crawl task and dispatch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// How long the dispatcher waits for a task's start signal (milliseconds)
    #[serde(rename = "start-ack-timeout-ms")]
    pub start_ack_timeout_ms: u64,

    /// Visit every fetchable child link instead of stopping after the first
    #[serde(rename = "visit-all-children")]
    pub visit_all_children: bool,

    /// Skip seeds that fail to fetch instead of failing the whole job
    #[serde(rename = "skip-failed-seeds")]
    pub skip_failed_seeds: bool,

    /// Per-request timeout for page fetches (seconds); unset means none
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: Option<u64>,
}

impl CrawlerConfig {
    pub fn start_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.start_ack_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_ack_timeout_ms: 1000,
            visit_all_children: false,
            skip_failed_seeds: false,
            request_timeout_secs: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiGlean".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}
