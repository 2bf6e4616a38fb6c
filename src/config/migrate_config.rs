//! Migration configuration derived from CLI arguments

use std::path::PathBuf;
use std::time::Duration;

use super::address::{parse_address_list, ServerAddress};
use super::cli::CliArgs;
use super::pattern::KeyPattern;
use super::tls_config::TlsConfig;
use crate::migrate::{RetryPolicy, Strategy};

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password: String,
    pub username: Option<String>,
}

/// Everything needed to reach one cluster
#[derive(Debug, Clone)]
pub struct ClusterEndpoint {
    pub addresses: Vec<ServerAddress>,
    pub auth: Option<AuthConfig>,
    pub tls: Option<TlsConfig>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClusterEndpoint {
    /// Comma-joined address list for log lines
    pub fn describe(&self) -> String {
        self.addresses
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Which direction this run goes
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    Export { output: PathBuf },
    Import { input: PathBuf },
}

/// Complete, validated run configuration
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub mode: RunMode,
    pub source: ClusterEndpoint,
    pub target: ClusterEndpoint,
    pub pattern: KeyPattern,
    pub scan_batch: u64,
    pub strategy: Strategy,
    pub retry: RetryPolicy,
    pub quiet: bool,
    pub verbose: bool,
}

impl MigrateConfig {
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        args.validate()?;

        let connect_timeout = Duration::from_millis(args.connect_timeout_ms);
        let request_timeout = Duration::from_millis(args.request_timeout_ms);

        let tls_for = |enabled: bool| {
            enabled.then(|| TlsConfig {
                skip_verify: args.tls_skip_verify,
                ca_cert: args.tls_ca_cert.clone(),
                sni: args.tls_sni.clone(),
            })
        };

        let source = ClusterEndpoint {
            addresses: parse_addresses("--source-addrs", &args.source_addrs)?,
            auth: args.source_pass.as_ref().map(|p| AuthConfig {
                password: p.clone(),
                username: args.source_user.clone(),
            }),
            tls: tls_for(args.source_tls),
            connect_timeout,
            request_timeout,
        };

        let target = ClusterEndpoint {
            addresses: parse_addresses("--target-addrs", &args.target_addrs)?,
            auth: args.target_pass.as_ref().map(|p| AuthConfig {
                password: p.clone(),
                username: args.target_user.clone(),
            }),
            tls: tls_for(args.target_tls),
            connect_timeout,
            request_timeout,
        };

        let mode = match &args.input {
            Some(input) => RunMode::Import {
                input: input.clone(),
            },
            None => RunMode::Export {
                output: args.output.clone(),
            },
        };

        Ok(Self {
            mode,
            source,
            target,
            pattern: KeyPattern::new(&args.pattern)?,
            scan_batch: args.batch,
            strategy: if args.use_dump {
                Strategy::Dump
            } else {
                Strategy::Decomposed
            },
            retry: RetryPolicy {
                max_retries: args.retries,
            },
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }
}

fn parse_addresses(flag: &str, list: &str) -> Result<Vec<ServerAddress>, String> {
    let addresses = parse_address_list(list).map_err(|e| format!("{}: {}", flag, e))?;
    if addresses.is_empty() {
        return Err(format!("{} must name at least one address", flag));
    }
    Ok(addresses)
}
