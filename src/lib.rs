//! Sumi-Glean: an asynchronous image harvester
//!
//! This crate accepts seed URLs over an HTTP API, crawls each seed page plus
//! its immediate child pages, and collects the image URLs it finds. Work is
//! tracked as jobs that clients submit, poll, and collect.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod server;

use jobs::JobId;
use thiserror::Error;

/// Main error type for Sumi-Glean operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Job registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    DuplicateKey(JobId),

    #[error("Job {0} has no worker handle attached")]
    NoHandle(JobId),

    #[error("Job {id} failed: {message}")]
    TaskFailed { id: JobId, message: String },
}

/// Result type alias for Sumi-Glean operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for job registry operations
pub type JobResult<T> = std::result::Result<T, JobError>;

// Re-export commonly used types
pub use config::Config;
pub use jobs::{Dispatcher, JobRegistry, JobState, Submission};
pub use server::GleanServer;
