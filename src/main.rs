//! Sumi-Glean main entry point
//!
//! This is the command-line interface for the Sumi-Glean image harvester.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use sumi_glean::config::{load_config_with_hash, Config};
use sumi_glean::GleanServer;
use tracing_subscriber::EnvFilter;

/// Sumi-Glean: an asynchronous image harvester
///
/// Sumi-Glean serves an HTTP API that accepts seed URLs, crawls each seed and
/// its immediate child pages, and reports the image URLs it finds as jobs
/// that can be polled for status and result.
#[derive(Parser, Debug)]
#[command(name = "sumi-glean")]
#[command(version)]
#[command(about = "An asynchronous image harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without serving
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    if cli.dry_run {
        print_config(&config);
        return Ok(());
    }

    let server = GleanServer::new(config).context("Failed to initialize server")?;
    server
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_glean=info,tower_http=info,warn"),
            1 => EnvFilter::new("sumi_glean=debug,tower_http=debug,info"),
            2 => EnvFilter::new("sumi_glean=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn print_config(config: &Config) {
    println!("=== Sumi-Glean Dry Run ===\n");

    println!("Server:");
    println!("  Bind address: {}", config.server.bind_address);
    println!("  Request logging: {}", config.server.request_logging);

    println!("\nCrawler:");
    println!(
        "  Start acknowledgement timeout: {}ms",
        config.crawler.start_ack_timeout_ms
    );
    println!("  Visit all children: {}", config.crawler.visit_all_children);
    println!("  Skip failed seeds: {}", config.crawler.skip_failed_seeds);
    match config.crawler.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {}s", secs),
        None => println!("  Request timeout: none"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\n✓ Configuration is valid");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
