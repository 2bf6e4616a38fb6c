//! Export file: a JSON array of snapshot records
//!
//! ```text
//! [
//!   { "key": "user:1", "type": "string", "ttl": 0, "dump": "AAVhbGljZQsA..." },
//!   { "key": "user:2", "type": "hash", "ttl": 90000000000, "value": { "name": "bob" } }
//! ]
//! ```
//!
//! `ttl` is in nanoseconds, `0` meaning no expiration. Binary strings that are
//! not plain UTF-8 are written as `base64:<standard base64>`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number};
use tracing::debug;

use super::commands::parse_score;
use super::snapshot::{Expiry, KeyType, Payload, Snapshot, Strategy, Value};
use crate::config::KeyPattern;
use crate::utils::{MigrateError, RecordError, Result};

const BASE64_PREFIX: &str = "base64:";

/// Binary-safe text form of `bytes`
pub fn encode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.starts_with(BASE64_PREFIX) => s.to_string(),
        _ => format!("{}{}", BASE64_PREFIX, STANDARD.encode(bytes)),
    }
}

/// Inverse of `encode_text`
pub fn decode_text(text: &str) -> std::result::Result<Vec<u8>, RecordError> {
    match text.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => STANDARD
            .decode(encoded)
            .map_err(|e| RecordError::InvalidBase64(e.to_string())),
        None => Ok(text.as_bytes().to_vec()),
    }
}

/// One element of the export array, exactly as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump: Option<String>,
}

impl ExportRecord {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let (value, dump) = match snapshot.payload() {
            Payload::Opaque(bytes) => (None, Some(STANDARD.encode(bytes))),
            Payload::Decomposed(value) => (Some(encode_value(value)), None),
        };
        Self {
            key: encode_text(snapshot.key()),
            key_type: snapshot.key_type().as_str().to_string(),
            ttl: snapshot.expiry().as_nanos(),
            value,
            dump,
        }
    }

    /// Strategy implied by which payload field is present
    pub fn payload_strategy(&self) -> Option<Strategy> {
        match (&self.value, &self.dump) {
            (None, Some(_)) => Some(Strategy::Dump),
            (Some(_), None) => Some(Strategy::Decomposed),
            _ => None,
        }
    }

    pub fn into_snapshot(self) -> std::result::Result<Snapshot, RecordError> {
        let key = decode_text(&self.key)?;
        let key_type =
            KeyType::from_name(&self.key_type).ok_or(RecordError::UnknownType(self.key_type))?;
        let expiry = Expiry::from_nanos(self.ttl).ok_or(RecordError::NegativeTtl(self.ttl))?;

        match (self.value, self.dump) {
            (Some(_), Some(_)) => Err(RecordError::BothPayloads),
            (None, None) => Err(RecordError::MissingPayload),
            (None, Some(dump)) => {
                let bytes = STANDARD
                    .decode(dump)
                    .map_err(|e| RecordError::InvalidBase64(e.to_string()))?;
                Ok(Snapshot::opaque(key, key_type, expiry, bytes))
            }
            (Some(value), None) => {
                let value = decode_value(key_type, value)?;
                Ok(Snapshot::decomposed(key, expiry, value))
            }
        }
    }
}

fn encode_score(score: f64) -> serde_json::Value {
    match Number::from_f64(score) {
        Some(n) => serde_json::Value::Number(n),
        None if score == f64::INFINITY => json!("inf"),
        None if score == f64::NEG_INFINITY => json!("-inf"),
        None => serde_json::Value::Null,
    }
}

fn encode_value(value: &Value) -> serde_json::Value {
    let texts = |items: &[Vec<u8>]| {
        serde_json::Value::Array(
            items
                .iter()
                .map(|i| serde_json::Value::String(encode_text(i)))
                .collect(),
        )
    };

    match value {
        Value::String(bytes) => serde_json::Value::String(encode_text(bytes)),
        Value::List(items) | Value::Set(items) => texts(items.as_slice()),
        Value::SortedSet(members) => serde_json::Value::Array(
            members
                .iter()
                .map(|(member, score)| {
                    json!({ "member": encode_text(member), "score": encode_score(*score) })
                })
                .collect(),
        ),
        Value::Hash(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(f, v)| (encode_text(f), serde_json::Value::String(encode_text(v))))
                .collect::<Map<_, _>>(),
        ),
    }
}

fn malformed(key_type: KeyType, reason: impl Into<String>) -> RecordError {
    RecordError::MalformedValue {
        key_type: key_type.as_str(),
        reason: reason.into(),
    }
}

fn decode_string(key_type: KeyType, json: &serde_json::Value) -> std::result::Result<Vec<u8>, RecordError> {
    match json {
        serde_json::Value::String(s) => decode_text(s),
        other => Err(malformed(key_type, format!("expected a string, found {}", other))),
    }
}

fn decode_strings(key_type: KeyType, json: serde_json::Value) -> std::result::Result<Vec<Vec<u8>>, RecordError> {
    match json {
        serde_json::Value::Array(items) => items.iter().map(|i| decode_string(key_type, i)).collect(),
        _ => Err(malformed(key_type, "expected an array of strings")),
    }
}

fn decode_score(json: &serde_json::Value) -> Option<f64> {
    match json {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_score(s.as_bytes()),
        _ => None,
    }
}

fn decode_value(key_type: KeyType, json: serde_json::Value) -> std::result::Result<Value, RecordError> {
    let value = match key_type {
        KeyType::String => Value::String(decode_string(key_type, &json)?),
        KeyType::List => Value::List(decode_strings(key_type, json)?),
        KeyType::Set => Value::Set(decode_strings(key_type, json)?),
        KeyType::SortedSet => {
            let serde_json::Value::Array(entries) = json else {
                return Err(malformed(key_type, "expected an array of {member, score}"));
            };
            let members = entries
                .iter()
                .map(|entry| {
                    let member = entry
                        .get("member")
                        .ok_or_else(|| malformed(key_type, "entry without member"))?;
                    let score = entry
                        .get("score")
                        .ok_or_else(|| malformed(key_type, "entry without score"))?;
                    let score = decode_score(score)
                        .ok_or_else(|| malformed(key_type, format!("non-numeric score {}", score)))?;
                    Ok((decode_string(key_type, member)?, score))
                })
                .collect::<std::result::Result<Vec<_>, RecordError>>()?;
            Value::SortedSet(members)
        }
        KeyType::Hash => {
            let serde_json::Value::Object(fields) = json else {
                return Err(malformed(key_type, "expected an object of field -> value"));
            };
            let fields = fields
                .iter()
                .map(|(field, value)| Ok((decode_text(field)?, decode_string(key_type, value)?)))
                .collect::<std::result::Result<Vec<_>, RecordError>>()?;
            Value::Hash(fields)
        }
    };
    Ok(value)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_records(path: &Path, records: &[ExportRecord]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records).map_err(io::Error::from)?;
    writer.write_all(b"\n")?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Write `snapshots` to `path` via `<path>.tmp` and a rename.
/// Returns the number of records written.
pub fn write_export(path: &Path, snapshots: &[Snapshot]) -> Result<usize> {
    let records: Vec<ExportRecord> = snapshots.iter().map(ExportRecord::from_snapshot).collect();
    let tmp = temp_path(path);

    if let Err(e) = write_records(&tmp, &records) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, path)?;

    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(records.len())
}

/// Parse the whole file; any syntax or shape error is fatal
pub fn read_export(path: &Path) -> Result<Vec<ExportRecord>> {
    let file = File::open(path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}

/// Fail unless every record carries the payload kind `strategy` expects.
/// Records with no usable payload are left for the per-key decode step.
pub fn check_strategy(records: &[ExportRecord], strategy: Strategy) -> Result<()> {
    let mismatch = records
        .iter()
        .find(|r| matches!(r.payload_strategy(), Some(s) if s != strategy));

    match mismatch {
        Some(record) => Err(MigrateError::StrategyMismatch {
            expected: strategy.as_str(),
            found: record
                .payload_strategy()
                .map(|s| s.as_str())
                .unwrap_or("unknown"),
            key: record.key.clone(),
        }),
        None => Ok(()),
    }
}

/// A record after per-key decoding
#[derive(Debug)]
pub struct DecodedRecord {
    /// Key as written in the file, for log lines
    pub label: String,
    pub snapshot: std::result::Result<Snapshot, RecordError>,
}

/// Read an export file for import: parse, filter by `pattern`, verify the
/// strategy, then decode each record on its own.
pub fn load_import(path: &Path, strategy: Strategy, pattern: &KeyPattern) -> Result<Vec<DecodedRecord>> {
    let mut records = read_export(path)?;
    let total = records.len();

    if !pattern.is_match_all() {
        records.retain(|r| match decode_text(&r.key) {
            Ok(key) => pattern.matches(&key),
            Err(_) => pattern.matches(r.key.as_bytes()),
        });
        debug!(
            "{} of {} records match '{}'",
            records.len(),
            total,
            pattern.as_str()
        );
    }

    check_strategy(&records, strategy)?;

    Ok(records
        .into_iter()
        .map(|record| DecodedRecord {
            label: record.key.clone(),
            snapshot: record.into_snapshot(),
        })
        .collect())
}
