//! Capture: read one key's type, TTL and value from the source cluster

use indicatif::ProgressBar;
use tracing::warn;

use super::commands::{parse_score, KeyCommands};
use super::counters::RunCounters;
use super::retry::RetryPolicy;
use super::snapshot::{Expiry, KeyType, Snapshot, Strategy, Value};
use crate::cluster::ClusterAccess;
use crate::utils::CaptureError;

/// Capture a single key: PTTL, then TYPE, then the value
pub fn capture<C>(cluster: &C, key: &[u8], strategy: Strategy) -> Result<Snapshot, CaptureError>
where
    C: ClusterAccess + ?Sized,
{
    let expiry = match cluster.pttl(key)? {
        -2 => return Err(CaptureError::KeyVanished),
        ms => Expiry::from_pttl(ms),
    };
    if expiry.exceeds_wire_range() {
        warn!(
            "TTL of {} exceeds the export range and is clamped to {} ns",
            String::from_utf8_lossy(key),
            i64::MAX
        );
    }

    let type_name = cluster.key_type(key)?;
    if type_name == "none" {
        return Err(CaptureError::KeyVanished);
    }
    let key_type = KeyType::from_name(&type_name).ok_or(CaptureError::UnsupportedType(type_name))?;

    match strategy {
        Strategy::Dump => {
            let dump = cluster.dump(key)?.ok_or(CaptureError::KeyVanished)?;
            Ok(Snapshot::opaque(key.to_vec(), key_type, expiry, dump))
        }
        Strategy::Decomposed => {
            let value = read_value(cluster, key, key_type)?;
            Ok(Snapshot::decomposed(key.to_vec(), expiry, value))
        }
    }
}

fn read_value<C>(cluster: &C, key: &[u8], key_type: KeyType) -> Result<Value, CaptureError>
where
    C: ClusterAccess + ?Sized,
{
    // Collections cannot exist empty, so an empty reply means the key expired
    // or was deleted between TYPE and the read.
    let value = match key_type {
        KeyType::String => Value::String(cluster.get(key)?.ok_or(CaptureError::KeyVanished)?),
        KeyType::List => Value::List(cluster.lrange_all(key)?),
        KeyType::Set => Value::Set(cluster.smembers(key)?),
        KeyType::Hash => Value::Hash(cluster.hgetall(key)?),
        KeyType::SortedSet => {
            let members = cluster
                .zrange_withscores(key)?
                .into_iter()
                .map(|(member, raw)| match parse_score(&raw) {
                    Some(score) => Ok((member, score)),
                    None => Err(CaptureError::MalformedReply(format!(
                        "non-numeric score {:?}",
                        String::from_utf8_lossy(&raw)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::SortedSet(members)
        }
    };

    if value.is_empty() {
        return Err(CaptureError::KeyVanished);
    }
    Ok(value)
}

/// Capture every key, skipping (and counting) the ones that fail
pub fn capture_all<C>(
    cluster: &C,
    keys: &[Vec<u8>],
    strategy: Strategy,
    retry: &RetryPolicy,
    counters: &RunCounters,
    progress: &ProgressBar,
) -> Vec<Snapshot>
where
    C: ClusterAccess + ?Sized,
{
    let mut snapshots = Vec::with_capacity(keys.len());

    for key in keys {
        let label = String::from_utf8_lossy(key);
        let result = retry.run(
            &label,
            counters,
            || capture(cluster, key, strategy),
            CaptureError::is_transient,
        );

        match result {
            Ok(snapshot) => {
                counters.record_success();
                snapshots.push(snapshot);
            }
            Err(CaptureError::KeyVanished) => {
                warn!("Key {} disappeared before capture", label);
                counters.record_failure();
            }
            Err(e) => {
                warn!("Failed to capture {}: {}", label, e);
                counters.record_failure();
            }
        }
        progress.inc(1);
    }

    snapshots
}
