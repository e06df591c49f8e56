//! HTTP server exposing the job API
//!
//! # Usage
//!
//! ```no_run
//! use sumi_glean::{Config, GleanServer};
//!
//! # async fn example() -> Result<(), sumi_glean::GleanError> {
//! let server = GleanServer::new(Config::default())?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{validate, Config};
use crate::crawler::build_http_client;
use crate::jobs::{Dispatcher, JobRegistry};
use crate::GleanError;

pub use api::create_router;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Accepts new crawl requests
    pub dispatcher: Arc<Dispatcher>,

    /// Answers status and result queries
    pub registry: Arc<JobRegistry>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Builds the state from configuration, including the shared HTTP client
    pub fn from_config(config: &Config) -> Result<Self, GleanError> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let registry = Arc::new(JobRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            client,
            &config.crawler,
        ));

        Ok(Self {
            dispatcher,
            registry,
            start_time: Instant::now(),
        })
    }
}

/// Main Sumi-Glean server
pub struct GleanServer {
    config: Config,
    state: AppState,
}

impl GleanServer {
    /// Creates a server, rejecting configuration that fails validation
    pub fn new(config: Config) -> Result<Self, GleanError> {
        validate(&config)?;
        let state = AppState::from_config(&config)?;
        Ok(Self { config, state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = create_router(self.state.clone());

        if self.config.server.request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Start the server and run until the process exits
    pub async fn start(&self) -> Result<(), GleanError> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Start with graceful shutdown
    ///
    /// In-flight crawl jobs are not awaited; they end with the process.
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), GleanError> {
        let router = self.build_router();
        let addr = self.config.server.bind_address;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        tracing::info!(
            "Server shutdown complete ({} jobs registered)",
            self.state.registry.len().await
        );
        Ok(())
    }
}
