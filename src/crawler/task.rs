//! Crawl task - the unit of work executed by the worker pool
//!
//! A task walks its seed URLs in order. Each seed contributes its own images
//! followed by the images of its child pages (one level down).

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::fetch_page;
use crate::crawler::parser::parse_html;
use crate::GleanError;
use reqwest::Client;

/// Behavior switches for a crawl task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Visit every fetchable child link instead of stopping after the first
    pub visit_all_children: bool,

    /// Skip seeds that fail to fetch instead of failing the whole task
    pub skip_failed_seeds: bool,
}

impl From<&CrawlerConfig> for CrawlOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            visit_all_children: config.visit_all_children,
            skip_failed_seeds: config.skip_failed_seeds,
        }
    }
}

/// An executable crawl over one or more seed URLs
#[derive(Debug, Clone)]
pub struct CrawlTask {
    seeds: Vec<String>,
    options: CrawlOptions,
}

impl CrawlTask {
    pub fn new(seeds: Vec<String>, options: CrawlOptions) -> Self {
        Self { seeds, options }
    }

    /// Runs the crawl and returns every image URL found
    ///
    /// For each seed, in order:
    /// 1. Fetch the seed page; a failure aborts the task unless
    ///    `skip_failed_seeds` is set
    /// 2. Append the seed's images
    /// 3. Walk the seed's child links in document order, skipping any that
    ///    are malformed or unreachable, appending each visited child's images
    /// 4. Stop after the first visited child unless `visit_all_children`
    ///    is set
    pub async fn run(&self, client: &Client) -> Result<Vec<String>, GleanError> {
        let mut images = Vec::new();

        for seed in &self.seeds {
            let page = match fetch_page(client, seed).await {
                Ok(page) => page,
                Err(e) if self.options.skip_failed_seeds => {
                    tracing::warn!("Skipping seed {}: {}", seed, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let parsed = parse_html(&page.body, &page.url);
            tracing::debug!(
                "Seed {} (HTTP {}): {} images, {} child links",
                seed,
                page.status_code,
                parsed.images.len(),
                parsed.links.len()
            );
            images.extend(parsed.images);

            self.crawl_children(client, &parsed.links, &mut images).await;
        }

        Ok(images)
    }

    async fn crawl_children(&self, client: &Client, links: &[String], images: &mut Vec<String>) {
        for link in links {
            let page = match fetch_page(client, link).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!("Skipping child {}: {}", link, e);
                    continue;
                }
            };

            let parsed = parse_html(&page.body, &page.url);
            tracing::debug!(
                "Child {} (HTTP {}): {} images",
                link,
                page.status_code,
                parsed.images.len()
            );
            images.extend(parsed.images);

            if !self.options.visit_all_children {
                break;
            }
        }
    }
}
