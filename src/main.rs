//! Catalog Indexer main entry point
//!
//! This is the command-line interface for the catalog indexing engine.

use anyhow::{bail, Context};
use catalog_indexer::config::{load_config_with_hash, Config, LoggingConfig};
use catalog_indexer::crawler::run_all;
use catalog_indexer::output::print_summary;
use catalog_indexer::IndexerRegistry;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Catalog Indexer: crawls remote catalogs into datasets
///
/// Each configured indexer discovers its catalog's listing pages, fetches
/// them (optionally through an anti-bot relay), enriches items from their
/// detail pages and writes one dataset file per run.
#[derive(Parser, Debug)]
#[command(name = "catalog-indexer")]
#[command(version = "1.0.0")]
#[command(about = "A fetch-retry-extract-batch catalog indexer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "list")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only run the named indexer (repeatable)
    #[arg(long, value_name = "NAME")]
    only: Vec<String>,

    /// Validate config and show the resolved settings without fetching anything
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// List the available indexers and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let registry = IndexerRegistry::builtin();

    if cli.list {
        println!("Available indexers:");
        for name in registry.names() {
            println!("  - {}", name);
        }
        return Ok(());
    }

    let Some(config_path) = cli.config.as_ref() else {
        bail!("a configuration file is required");
    };

    let (config, config_hash) = load_config_with_hash(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    setup_logging(&config.logging, cli.verbose, cli.quiet)?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        config_path.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config, &registry, &cli.only);
        return Ok(());
    }

    handle_run(&config, &registry, &cli.only).await
}

/// Sets up the logging/tracing subscriber
///
/// Verbosity flags win over the configured level. When a log directory is
/// configured, every line is also appended to `main.log` inside it.
fn setup_logging(logging: &LoggingConfig, verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new(format!(
                "catalog_indexer={},warn",
                logging.level.to_ascii_lowercase()
            )),
            1 => EnvFilter::new("catalog_indexer=debug,info"),
            2 => EnvFilter::new("catalog_indexer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match &logging.path {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("main.log"))
                .context("Failed to open log file")?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: shows what each indexer would run with
fn handle_dry_run(config: &Config, registry: &IndexerRegistry, only: &[String]) {
    println!("=== Catalog Indexer Dry Run ===\n");

    println!("Output directory: {}", config.output.dir.display());
    match &config.relay {
        Some(relay) => println!(
            "Relay: {} (concurrency {}, maxTimeout {}ms)",
            relay.url, relay.concurrency_limit, relay.max_timeout_ms
        ),
        None => println!("Relay: not configured"),
    }

    let selected: Vec<_> = config
        .enabled_indexers()
        .into_iter()
        .filter(|settings| only.is_empty() || only.contains(&settings.name))
        .collect();

    println!("\nIndexers ({}):", selected.len());
    for settings in &selected {
        let status = if registry.contains(&settings.name) {
            "ok"
        } else {
            "unknown, would be skipped"
        };
        println!("  - {} [{}]", settings.name, status);
        println!("    Base URL: {}", settings.base_url);
        println!("    Max attempts: {}", settings.max_attempts);
        println!("    Concurrency limit: {}", settings.concurrency_limit);
        println!("    Batch size: {}", settings.batch_size);
        println!("    Page limit: {}", settings.page_limit);
        println!("    Chunk size: {}", settings.chunk_size);
        println!("    Timeout: {:?}", settings.timeout);
        if let Some(relay) = &settings.relay {
            println!(
                "    Relay: {} (concurrency {})",
                relay.url, relay.concurrency_limit
            );
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main run: every selected indexer, in order
async fn handle_run(config: &Config, registry: &IndexerRegistry, only: &[String]) -> anyhow::Result<()> {
    let report = run_all(config, registry, only).await;

    for summary in &report.summaries {
        print_summary(summary);
    }

    if !report.skipped.is_empty() {
        tracing::warn!("Skipped unknown indexers: {}", report.skipped.join(", "));
    }

    if !report.is_success() {
        let failed: Vec<&str> = report.failures.iter().map(|(name, _)| name.as_str()).collect();
        bail!("{} indexer(s) failed: {}", failed.len(), failed.join(", "));
    }

    tracing::info!("All indexers completed successfully");
    Ok(())
}
