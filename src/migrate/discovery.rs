//! Key discovery: a full SCAN of every shard-owning primary
//!
//! Each primary is scanned on its own thread over a dedicated connection.
//! Keys are collected into a shared `KeySet`, so a key reported by more
//! than one node is captured only once. A node that cannot be scanned
//! completely fails the whole discovery.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::key_set::KeySet;
use crate::client::{ControlPlane, ControlPlaneExt};
use crate::cluster::{ClusterAccess, ClusterNode};
use crate::config::KeyPattern;
use crate::utils::{ClusterError, MigrateError, NodeFailure};

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub pattern: KeyPattern,
    /// COUNT hint per SCAN round trip
    pub batch_size: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            pattern: KeyPattern::default(),
            batch_size: 1000,
        }
    }
}

/// What one node's scan contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeScanStats {
    pub node: String,
    /// Keys returned by SCAN, duplicates included
    pub keys_returned: u64,
    /// Keys this node added to the shared set
    pub new_keys: u64,
    pub round_trips: u64,
}

#[derive(Debug)]
pub struct DiscoveryReport {
    /// Distinct keys, sorted
    pub keys: Vec<Vec<u8>>,
    pub nodes: Vec<NodeScanStats>,
    pub elapsed: Duration,
}

impl DiscoveryReport {
    /// Keys seen more than once across nodes
    pub fn duplicates(&self) -> u64 {
        let returned: u64 = self.nodes.iter().map(|n| n.keys_returned).sum();
        returned.saturating_sub(self.keys.len() as u64)
    }
}

/// Enumerate every key matching `options.pattern` across the cluster
pub fn discover<C>(cluster: &C, options: &DiscoveryOptions) -> Result<DiscoveryReport, MigrateError>
where
    C: ClusterAccess + Sync + ?Sized,
{
    let primaries = cluster.primaries();
    if primaries.is_empty() {
        return Err(ClusterError::NoPrimaries.into());
    }

    let start = Instant::now();
    let keys = KeySet::new();
    info!(
        "Scanning {} primaries for keys matching '{}'",
        primaries.len(),
        options.pattern.as_str()
    );

    let outcomes: Vec<(String, Result<NodeScanStats, String>)> = thread::scope(|s| {
        let handles: Vec<_> = primaries
            .iter()
            .map(|node| {
                let keys = &keys;
                let name = node.address().to_string();
                let handle = s.spawn(move || scan_primary(cluster, node, options, keys));
                (name, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|_| Err("scan thread panicked".to_string()));
                (name, outcome)
            })
            .collect()
    });

    let mut nodes = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (node, outcome) in outcomes {
        match outcome {
            Ok(stats) => {
                debug!(
                    "{}: {} keys returned, {} new, {} round trips",
                    stats.node, stats.keys_returned, stats.new_keys, stats.round_trips
                );
                nodes.push(stats);
            }
            Err(reason) => {
                warn!("Discovery failed on {}: {}", node, reason);
                failures.push(NodeFailure { node, reason });
            }
        }
    }

    if !failures.is_empty() {
        return Err(MigrateError::Discovery { failures });
    }

    let report = DiscoveryReport {
        keys: keys.into_keys(),
        nodes,
        elapsed: start.elapsed(),
    };
    info!(
        "Discovered {} distinct keys in {:.2}s ({} duplicates across nodes)",
        report.keys.len(),
        report.elapsed.as_secs_f64(),
        report.duplicates()
    );
    Ok(report)
}

fn scan_primary<C>(
    cluster: &C,
    node: &ClusterNode,
    options: &DiscoveryOptions,
    keys: &KeySet,
) -> Result<NodeScanStats, String>
where
    C: ClusterAccess + ?Sized,
{
    let mut conn = cluster
        .open_node(node)
        .map_err(|e| format!("connect failed: {}", e))?;
    let name = node.address().to_string();
    scan_node(&mut conn, &name, options, keys).map_err(|e| format!("SCAN failed: {}", e))
}

/// Drive the SCAN cursor on one node until it returns to 0
pub fn scan_node<N>(
    conn: &mut N,
    node: &str,
    options: &DiscoveryOptions,
    keys: &KeySet,
) -> io::Result<NodeScanStats>
where
    N: ControlPlane + ?Sized,
{
    let mut stats = NodeScanStats {
        node: node.to_string(),
        keys_returned: 0,
        new_keys: 0,
        round_trips: 0,
    };
    let mut cursor = 0u64;

    loop {
        let page = conn.scan(cursor, options.pattern.as_str(), options.batch_size)?;
        stats.round_trips += 1;
        stats.keys_returned += page.keys.len() as u64;

        for key in page.keys {
            if keys.add(key) {
                stats.new_keys += 1;
            }
        }

        cursor = page.cursor;
        if cursor == 0 {
            return Ok(stats);
        }
    }
}
