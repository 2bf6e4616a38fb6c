//! valkey-migrate - export a cluster's keys to a file, or import them back
//!
//! Export (default) discovers every key on the source cluster, captures it
//! with DUMP or as a decomposed value, and writes a JSON export file.
//! Import (`--input`) replays such a file onto the target cluster.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use valkey_migrate::cluster::ClusterClient;
use valkey_migrate::config::{CliArgs, MigrateConfig, RunMode};
use valkey_migrate::migrate::{load_import, run_export, run_import, ExportOptions, ImportOptions};
use valkey_migrate::utils::MigrateError;

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

fn print_banner(config: &MigrateConfig) {
    if config.quiet {
        return;
    }

    println!("valkey-migrate v{}", env!("CARGO_PKG_VERSION"));
    println!("====================================");
    match &config.mode {
        RunMode::Export { output } => {
            println!("Mode: export -> {}", output.display());
            println!("Source: {}", config.source.describe());
            println!(
                "Pattern: {}, SCAN batch: {}",
                config.pattern.as_str(),
                config.scan_batch
            );
        }
        RunMode::Import { input } => {
            println!("Mode: import <- {}", input.display());
            println!("Target: {}", config.target.describe());
            if !config.pattern.is_match_all() {
                println!("Pattern: {}", config.pattern.as_str());
            }
        }
    }
    println!("Strategy: {}", config.strategy);
    if config.retry.max_retries > 0 {
        println!("Retries per key: {}", config.retry.max_retries);
    }
    println!("====================================\n");
}

fn export(config: &MigrateConfig, output: &Path) -> Result<()> {
    info!("Connecting to source cluster {}", config.source.describe());
    let source = ClusterClient::connect(&config.source).context("source cluster")?;

    let options = ExportOptions {
        pattern: config.pattern.clone(),
        scan_batch: config.scan_batch,
        strategy: config.strategy,
        retry: config.retry,
        show_progress: !config.quiet,
    };
    let summary = run_export(&source, &options, output)?;

    println!("\n====================================");
    println!("EXPORT COMPLETE");
    println!("====================================");
    println!("Keys discovered: {}", summary.discovered);
    println!("Capture: {}", summary.capture);
    println!(
        "Records written: {} -> {}",
        summary.written,
        summary.output.display()
    );
    Ok(())
}

fn import(config: &MigrateConfig, input: &Path) -> Result<()> {
    // Fully parsed and checked before the target is touched
    let records = load_import(input, config.strategy, &config.pattern)
        .with_context(|| format!("reading {}", input.display()))?;

    let summary = if records.is_empty() {
        info!("{} has no records to import", input.display());
        Default::default()
    } else {
        info!("Connecting to target cluster {}", config.target.describe());
        let target = ClusterClient::connect(&config.target).context("target cluster")?;
        let options = ImportOptions {
            retry: config.retry,
            show_progress: !config.quiet,
        };
        run_import(&target, &records, &options)
    };

    println!("\n====================================");
    println!("IMPORT COMPLETE");
    println!("====================================");
    println!("Restore: {}", summary);
    Ok(())
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet);

    let config = MigrateConfig::from_cli(&args).map_err(MigrateError::Config)?;
    print_banner(&config);

    match &config.mode {
        RunMode::Export { output } => export(&config, output),
        RunMode::Import { input } => import(&config, input),
    }
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
