//! Export and import runs
//!
//! Export: discovery -> capture -> export file.
//! Import: export file -> restoration. The file is fully parsed and checked
//! before the first write to the target.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::archive::{write_export, DecodedRecord};
use super::capture::capture_all;
use super::counters::{CounterSummary, RunCounters};
use super::discovery::{discover, DiscoveryOptions};
use super::restore::restore_all;
use super::retry::RetryPolicy;
use super::snapshot::Strategy;
use crate::cluster::ClusterAccess;
use crate::config::KeyPattern;
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub pattern: KeyPattern,
    pub scan_batch: u64,
    pub strategy: Strategy,
    pub retry: RetryPolicy,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub retry: RetryPolicy,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Distinct keys found by discovery
    pub discovered: usize,
    /// Records in the export file
    pub written: usize,
    pub output: PathBuf,
    pub capture: CounterSummary,
}

fn progress_bar(total: u64, visible: bool, verb: &str) -> ProgressBar {
    if !visible || total == 0 {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{per_sec}})",
        verb
    );
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Discover, capture and write every key matching `options.pattern`
pub fn run_export<C>(cluster: &C, options: &ExportOptions, output: &Path) -> Result<ExportSummary>
where
    C: ClusterAccess + Sync + ?Sized,
{
    let discovery = discover(
        cluster,
        &DiscoveryOptions {
            pattern: options.pattern.clone(),
            batch_size: options.scan_batch,
        },
    )?;
    let keys = discovery.keys;

    if keys.is_empty() {
        info!("No keys match '{}'", options.pattern.as_str());
    } else {
        info!(
            "Capturing {} keys with the {} strategy",
            keys.len(),
            options.strategy
        );
    }

    let counters = RunCounters::new();
    let pb = progress_bar(keys.len() as u64, options.show_progress, "captured");
    let snapshots = capture_all(
        cluster,
        &keys,
        options.strategy,
        &options.retry,
        &counters,
        &pb,
    );
    pb.finish_and_clear();

    let written = write_export(output, &snapshots)?;
    let capture = counters.summary();
    info!("Capture: {}", capture);
    info!("Wrote {} records to {}", written, output.display());

    Ok(ExportSummary {
        discovered: keys.len(),
        written,
        output: output.to_path_buf(),
        capture,
    })
}

/// Restore every decoded record onto `cluster`
pub fn run_import<C>(cluster: &C, records: &[DecodedRecord], options: &ImportOptions) -> CounterSummary
where
    C: ClusterAccess + ?Sized,
{
    info!("Restoring {} records", records.len());

    let counters = RunCounters::new();
    let pb = progress_bar(records.len() as u64, options.show_progress, "restored");
    restore_all(cluster, records, &options.retry, &counters, &pb);
    pb.finish_and_clear();

    let summary = counters.summary();
    info!("Restore: {} ({:.0} keys/s)", summary, summary.throughput());
    summary
}
