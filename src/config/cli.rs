//! Command-line argument parsing

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Migrate keys between Valkey/Redis clusters.
///
/// Without --input the source cluster is exported to --output. With --input the
/// file is imported into the target cluster.
#[derive(Parser, Debug, Clone)]
#[command(name = "valkey-migrate")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    // ===== Source cluster =====
    /// Source cluster addresses (comma-separated host:port)
    #[arg(long = "source-addrs", default_value = "localhost:7000,localhost:7001")]
    pub source_addrs: String,

    /// Source cluster username (ACL)
    #[arg(long = "source-user")]
    pub source_user: Option<String>,

    /// Source cluster password
    #[arg(long = "source-pass")]
    pub source_pass: Option<String>,

    /// Use TLS for the source cluster
    #[arg(long = "source-tls")]
    pub source_tls: bool,

    // ===== Target cluster =====
    /// Target cluster addresses (comma-separated host:port)
    #[arg(long = "target-addrs", default_value = "localhost:8000,localhost:8001")]
    pub target_addrs: String,

    /// Target cluster username (ACL)
    #[arg(long = "target-user")]
    pub target_user: Option<String>,

    /// Target cluster password
    #[arg(long = "target-pass")]
    pub target_pass: Option<String>,

    /// Use TLS for the target cluster
    #[arg(long = "target-tls")]
    pub target_tls: bool,

    // ===== TLS =====
    /// Skip TLS certificate verification (insecure)
    #[arg(long = "tls-skip-verify")]
    pub tls_skip_verify: bool,

    /// CA certificate file for TLS
    #[arg(long = "tls-ca-cert")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Server Name Indication for TLS
    #[arg(long = "tls-sni")]
    pub tls_sni: Option<String>,

    // ===== Operation =====
    /// Key pattern to match (glob-style)
    #[arg(long = "pattern", default_value = "*")]
    pub pattern: String,

    /// Output file for export
    #[arg(long = "output", default_value = "valkey-dump.json")]
    pub output: PathBuf,

    /// Input file for import (if set, runs import mode)
    #[arg(long = "input")]
    pub input: Option<PathBuf>,

    /// SCAN COUNT hint per round trip
    #[arg(long = "batch", default_value_t = 1000)]
    pub batch: u64,

    /// Use DUMP/RESTORE (recommended); false decomposes values by type
    #[arg(long = "use-dump", default_value_t = true, action = ArgAction::Set)]
    pub use_dump: bool,

    /// Extra attempts per key after a transient failure
    #[arg(long = "retries", default_value_t = 0)]
    pub retries: u32,

    /// Connection timeout in milliseconds
    #[arg(long = "connect-timeout-ms", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Per-request read/write timeout in milliseconds
    #[arg(long = "request-timeout-ms", default_value_t = 30000)]
    pub request_timeout_ms: u64,

    // ===== Output =====
    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only log errors and hide progress bars
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.batch == 0 {
            return Err("--batch must be greater than 0".to_string());
        }
        if self.verbose && self.quiet {
            return Err("--verbose and --quiet are mutually exclusive".to_string());
        }
        if self.source_user.is_some() && self.source_pass.is_none() {
            return Err("--source-user requires --source-pass".to_string());
        }
        if self.target_user.is_some() && self.target_pass.is_none() {
            return Err("--target-user requires --target-pass".to_string());
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        Ok(())
    }
}
