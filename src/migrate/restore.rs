//! Restoration: write captured snapshots to the target cluster

use indicatif::ProgressBar;
use tracing::{debug, warn};

use super::archive::DecodedRecord;
use super::commands::KeyCommands;
use super::counters::RunCounters;
use super::retry::RetryPolicy;
use super::snapshot::{Payload, Snapshot, Value};
use crate::cluster::ClusterAccess;
use crate::utils::RestoreError;

/// Elements per RPUSH/SADD/ZADD/HSET request
pub const INSERT_CHUNK: usize = 512;

/// Write one snapshot.
///
/// Opaque payloads go through a single `RESTORE ... REPLACE`. Decomposed
/// collections are rebuilt with `DEL`, chunked inserts and a trailing
/// `PEXPIRE`, which is not atomic: a failure part way leaves a partial key
/// without expiration until the key is restored again.
pub fn restore<C>(cluster: &C, snapshot: &Snapshot) -> Result<(), RestoreError>
where
    C: ClusterAccess + ?Sized,
{
    let key = snapshot.key();
    let ttl_ms = snapshot.expiry().write_millis();

    let value = match snapshot.payload() {
        Payload::Opaque(dump) => {
            cluster.restore_replace(key, ttl_ms.unwrap_or(0), dump)?;
            return Ok(());
        }
        Payload::Decomposed(value) => value,
    };

    if value.is_empty() {
        return Err(RestoreError::EmptyValue(value.key_type().as_str()));
    }

    match value {
        Value::String(bytes) => {
            cluster.set(key, bytes, ttl_ms)?;
            return Ok(());
        }
        Value::List(items) => {
            cluster.del(key)?;
            for chunk in items.chunks(INSERT_CHUNK) {
                cluster.rpush(key, chunk)?;
            }
        }
        Value::Set(members) => {
            cluster.del(key)?;
            for chunk in members.chunks(INSERT_CHUNK) {
                cluster.sadd(key, chunk)?;
            }
        }
        Value::SortedSet(members) => {
            cluster.del(key)?;
            for chunk in members.chunks(INSERT_CHUNK) {
                cluster.zadd(key, chunk)?;
            }
        }
        Value::Hash(fields) => {
            cluster.del(key)?;
            for chunk in fields.chunks(INSERT_CHUNK) {
                cluster.hset(key, chunk)?;
            }
        }
    }

    if let Some(ms) = ttl_ms {
        cluster.pexpire(key, ms)?;
    }
    Ok(())
}

/// Restore every decoded record, skipping (and counting) the ones that fail
pub fn restore_all<C>(
    cluster: &C,
    records: &[DecodedRecord],
    retry: &RetryPolicy,
    counters: &RunCounters,
    progress: &ProgressBar,
) where
    C: ClusterAccess + ?Sized,
{
    for record in records {
        let result = match &record.snapshot {
            Ok(snapshot) => retry.run(
                &record.label,
                counters,
                || restore(cluster, snapshot),
                RestoreError::is_transient,
            ),
            Err(e) => Err(RestoreError::Record(e.clone())),
        };

        match result {
            Ok(()) => {
                debug!("Restored {}", record.label);
                counters.record_success();
            }
            Err(e) => {
                warn!("Failed to restore {}: {}", record.label, e);
                counters.record_failure();
            }
        }
        progress.inc(1);
    }
}
