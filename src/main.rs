//! Carwatch main entry point
//!
//! This is the command-line interface for the Carwatch listing monitor.

use anyhow::Context;
use carwatch::cache::DetailCache;
use carwatch::config::{load_config_with_hash, Config};
use carwatch::ledger::Ledger;
use carwatch::storage::{open_store, CACHE_TABLE, LEDGER_TABLE};
use carwatch::{CycleReport, Monitor};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Carwatch: a classifieds listing monitor
///
/// Carwatch checks a vehicle search-results page on a fixed interval,
/// extracts every listing with its detail page, and prints the listings
/// it has not seen before as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "carwatch")]
#[command(version)]
#[command(about = "A classifieds listing monitor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Replace the configured search URL for this run
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Run a single check, print new listings, and exit
    #[arg(long, conflicts_with = "stats")]
    once: bool,

    /// Show ledger and cache sizes and exit
    #[arg(long, conflicts_with = "once")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let monitor = Monitor::from_config(&config)?;
    if let Some(url) = &cli.url {
        monitor.handle().set_target_url(url)?;
    }

    if cli.once {
        handle_once(monitor).await
    } else {
        handle_monitor(monitor).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("carwatch=info,warn"),
            1 => EnvFilter::new("carwatch=debug,info"),
            2 => EnvFilter::new("carwatch=trace,debug"),
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

/// Handles the --stats mode: shows what the stores hold
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = &config.storage;

    let ledger = Ledger::open(
        open_store(storage.ledger_backend, &storage.ledger_path, LEDGER_TABLE)
            .with_context(|| format!("failed to open {}", storage.ledger_path.display()))?,
    );
    let cache = DetailCache::open(
        open_store(storage.cache_backend, &storage.cache_path, CACHE_TABLE)
            .with_context(|| format!("failed to open {}", storage.cache_path.display()))?,
    );

    println!("=== Carwatch Stats ===\n");
    println!("Target: {}", config.monitor.target_url);
    println!(
        "Known listings: {} ({:?}, {})",
        ledger.len(),
        storage.ledger_backend,
        storage.ledger_path.display()
    );
    println!(
        "Cached details: {} ({:?}, {})",
        cache.len(),
        storage.cache_backend,
        storage.cache_path.display()
    );
    if ledger.is_first_run() {
        println!("\nThe next check will establish a baseline");
    }

    Ok(())
}

/// Handles the --once mode: one cycle, new records on stdout
async fn handle_once(monitor: Monitor) -> anyhow::Result<()> {
    let report = monitor.check_once().await;
    if report.baseline {
        tracing::info!(
            "Baseline established with {} listings; nothing reported",
            report.found
        );
    }
    print_report(&report)
}

/// Handles the default mode: monitor until Ctrl-C
async fn handle_monitor(monitor: Monitor) -> anyhow::Result<()> {
    let handle = monitor.handle();
    let (tx, mut rx) = mpsc::channel::<CycleReport>(16);

    let printer = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            if let Err(e) = print_report(&report) {
                tracing::error!("Failed to print report: {}", e);
            }
        }
    });

    let runner = tokio::spawn(monitor.run(Some(tx)));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down, finishing the current step...");
    handle.stop();

    runner.await.context("monitor task panicked")?;
    printer.await.context("report printer panicked")?;

    let status = handle.status();
    tracing::info!(
        "Completed {} checks, {} new listings, {} known",
        status.cycles_completed,
        status.total_new,
        status.known_ids
    );
    Ok(())
}

fn print_report(report: &CycleReport) -> anyhow::Result<()> {
    for record in &report.new_records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
