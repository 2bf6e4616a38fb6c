//! valkey-datagen - populate a cluster with mixed-type keys for rehearsals

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use valkey_migrate::cluster::ClusterClient;
use valkey_migrate::config::{parse_address_list, AuthConfig, ClusterEndpoint, TlsConfig};
use valkey_migrate::generator::{generate, parse_types, GeneratorConfig};

/// Generate random string, list, set, hash and zset keys on a cluster.
#[derive(Parser, Debug)]
#[command(name = "valkey-datagen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Cluster addresses (comma-separated host:port)
    #[arg(long, default_value = "localhost:7000,localhost:7001,localhost:7002")]
    addrs: String,

    /// Username (ACL)
    #[arg(long)]
    user: Option<String>,

    /// Password
    #[arg(long)]
    password: Option<String>,

    /// Use TLS
    #[arg(long)]
    tls: bool,

    /// Skip TLS certificate verification (insecure)
    #[arg(long = "tls-skip-verify")]
    tls_skip_verify: bool,

    /// Key prefix
    #[arg(long, default_value = "test")]
    prefix: String,

    /// Number of keys to generate
    #[arg(long, default_value_t = 1000)]
    count: u64,

    /// Data types to generate (comma-separated)
    #[arg(long, default_value = "string,list,set,hash,zset")]
    types: String,

    /// Minimum TTL in seconds
    #[arg(long = "min-ttl", default_value_t = 0)]
    min_ttl: u64,

    /// Maximum TTL in seconds (0 = no expiration)
    #[arg(long = "max-ttl", default_value_t = 0)]
    max_ttl: u64,

    /// Size of random string values in bytes
    #[arg(long = "string-size", default_value_t = 100)]
    string_size: usize,

    /// Number of elements in lists
    #[arg(long = "list-size", default_value_t = 10)]
    list_size: usize,

    /// Number of members in sets
    #[arg(long = "set-size", default_value_t = 10)]
    set_size: usize,

    /// Number of fields in generic hashes
    #[arg(long = "hash-fields", default_value_t = 5)]
    hash_fields: usize,

    /// Number of members in sorted sets
    #[arg(long = "zset-members", default_value_t = 10)]
    zset_members: usize,

    /// Random seed for reproducible data
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress progress and informational output
    #[arg(short, long)]
    quiet: bool,
}

fn run() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.quiet { Level::ERROR } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = GeneratorConfig {
        prefix: args.prefix.clone(),
        count: args.count,
        types: parse_types(&args.types).map_err(|e| anyhow!("--types: {}", e))?,
        min_ttl: args.min_ttl,
        max_ttl: args.max_ttl,
        string_size: args.string_size,
        list_size: args.list_size,
        set_size: args.set_size,
        hash_fields: args.hash_fields,
        zset_members: args.zset_members,
        seed: args.seed,
    };
    config
        .validate()
        .map_err(|e| anyhow!("Configuration error: {}", e))?;

    let endpoint = ClusterEndpoint {
        addresses: parse_address_list(&args.addrs).map_err(|e| anyhow!("--addrs: {}", e))?,
        auth: args.password.clone().map(|password| AuthConfig {
            password,
            username: args.user.clone(),
        }),
        tls: args.tls.then(|| TlsConfig {
            skip_verify: args.tls_skip_verify,
            ..TlsConfig::default()
        }),
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(30),
    };
    if endpoint.addresses.is_empty() {
        return Err(anyhow!("--addrs must name at least one address"));
    }

    let cluster = ClusterClient::connect(&endpoint).context("connecting to cluster")?;
    info!(
        "Generating {} keys with prefix '{}' on {}",
        config.count,
        config.prefix,
        endpoint.describe()
    );

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(config.count);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    };
    let summary = generate(&cluster, &config, &pb);
    pb.finish_and_clear();

    println!("Generation completed in {:.2}s", summary.elapsed.as_secs_f64());
    println!("  Generated: {} keys", summary.succeeded);
    println!("  Failed:    {} keys", summary.failed);
    println!("  Rate:      {:.0} keys/sec", summary.throughput());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
