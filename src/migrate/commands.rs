//! Typed keyed commands over `ClusterAccess`
//!
//! Extension trait in the style of `ControlPlaneExt`: every cluster gets
//! the capture/restore command set for free. Error replies become
//! `CommandError::Server`; replies of the wrong shape become
//! `CommandError::UnexpectedReply`.

use crate::cluster::ClusterAccess;
use crate::utils::{CommandError, RespValue};

/// Score text as sent in ZADD
pub fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

/// Parse a score from a ZRANGE WITHSCORES reply; NaN is rejected
pub fn parse_score(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| !s.is_nan())
}

pub trait KeyCommands: ClusterAccess {
    /// Remaining TTL in ms; -1 no expiry, -2 missing key
    fn pttl(&self, key: &[u8]) -> Result<i64, CommandError> {
        let reply = self.execute_for_key(key, &[b"PTTL", key])?;
        expect_integer("PTTL", reply)
    }

    /// TYPE reply; "none" when the key is missing
    fn key_type(&self, key: &[u8]) -> Result<String, CommandError> {
        match self.execute_for_key(key, &[b"TYPE", key])? {
            RespValue::SimpleString(name) => Ok(name),
            RespValue::Error(e) => Err(CommandError::Server(e)),
            other => Err(unexpected("TYPE", &other)),
        }
    }

    /// Serialized value; None when the key is missing
    fn dump(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CommandError> {
        let reply = self.execute_for_key(key, &[b"DUMP", key])?;
        expect_optional_bulk("DUMP", reply)
    }

    /// `RESTORE key ttl payload REPLACE`; ttl 0 means no expiry
    fn restore_replace(&self, key: &[u8], ttl_ms: u64, payload: &[u8]) -> Result<(), CommandError> {
        let ttl = ttl_ms.to_string();
        let reply = self.execute_for_key(key, &[b"RESTORE", key, ttl.as_bytes(), payload, b"REPLACE"])?;
        expect_ok("RESTORE", reply)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CommandError> {
        let reply = self.execute_for_key(key, &[b"GET", key])?;
        expect_optional_bulk("GET", reply)
    }

    /// `SET key value [PX ms]`
    fn set(&self, key: &[u8], value: &[u8], px_ms: Option<u64>) -> Result<(), CommandError> {
        let reply = match px_ms {
            Some(ms) => {
                let ms = ms.to_string();
                self.execute_for_key(key, &[b"SET", key, value, b"PX", ms.as_bytes()])?
            }
            None => self.execute_for_key(key, &[b"SET", key, value])?,
        };
        expect_ok("SET", reply)
    }

    /// All list elements in order
    fn lrange_all(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, CommandError> {
        let reply = self.execute_for_key(key, &[b"LRANGE", key, b"0", b"-1"])?;
        expect_bulk_array("LRANGE", reply)
    }

    fn rpush(&self, key: &[u8], items: &[Vec<u8>]) -> Result<i64, CommandError> {
        let reply = self.execute_for_key(key, &variadic(b"RPUSH", key, items.iter().map(Vec::as_slice)))?;
        expect_integer("RPUSH", reply)
    }

    fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, CommandError> {
        let reply = self.execute_for_key(key, &[b"SMEMBERS", key])?;
        expect_bulk_array("SMEMBERS", reply)
    }

    fn sadd(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64, CommandError> {
        let reply = self.execute_for_key(key, &variadic(b"SADD", key, members.iter().map(Vec::as_slice)))?;
        expect_integer("SADD", reply)
    }

    /// (member, raw score) pairs in ascending score order
    fn zrange_withscores(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CommandError> {
        let reply = self.execute_for_key(key, &[b"ZRANGE", key, b"0", b"-1", b"WITHSCORES"])?;
        expect_bulk_pairs("ZRANGE", reply)
    }

    fn zadd(&self, key: &[u8], members: &[(Vec<u8>, f64)]) -> Result<i64, CommandError> {
        let scores: Vec<String> = members.iter().map(|(_, s)| format_score(*s)).collect();
        let args = variadic(
            b"ZADD",
            key,
            members
                .iter()
                .zip(&scores)
                .flat_map(|((member, _), score)| [score.as_bytes(), member.as_slice()]),
        );
        let reply = self.execute_for_key(key, &args)?;
        expect_integer("ZADD", reply)
    }

    fn hgetall(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CommandError> {
        let reply = self.execute_for_key(key, &[b"HGETALL", key])?;
        expect_bulk_pairs("HGETALL", reply)
    }

    fn hset(&self, key: &[u8], fields: &[(Vec<u8>, Vec<u8>)]) -> Result<i64, CommandError> {
        let args = variadic(
            b"HSET",
            key,
            fields
                .iter()
                .flat_map(|(field, value)| [field.as_slice(), value.as_slice()]),
        );
        let reply = self.execute_for_key(key, &args)?;
        expect_integer("HSET", reply)
    }

    /// Returns false when the key does not exist
    fn pexpire(&self, key: &[u8], ms: u64) -> Result<bool, CommandError> {
        let ms = ms.to_string();
        let reply = self.execute_for_key(key, &[b"PEXPIRE", key, ms.as_bytes()])?;
        expect_integer("PEXPIRE", reply).map(|n| n == 1)
    }

    fn del(&self, key: &[u8]) -> Result<i64, CommandError> {
        let reply = self.execute_for_key(key, &[b"DEL", key])?;
        expect_integer("DEL", reply)
    }
}

// Blanket implementation: any ClusterAccess automatically gets KeyCommands
impl<T: ClusterAccess + ?Sized> KeyCommands for T {}

fn variadic<'a>(
    command: &'static [u8],
    key: &'a [u8],
    rest: impl Iterator<Item = &'a [u8]>,
) -> Vec<&'a [u8]> {
    let mut args: Vec<&[u8]> = vec![command, key];
    args.extend(rest);
    args
}

fn unexpected(command: &'static str, reply: &RespValue) -> CommandError {
    CommandError::UnexpectedReply {
        command,
        reply: reply.describe(),
    }
}

fn expect_ok(command: &'static str, reply: RespValue) -> Result<(), CommandError> {
    match reply {
        reply if reply.is_ok() => Ok(()),
        RespValue::Error(e) => Err(CommandError::Server(e)),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_integer(command: &'static str, reply: RespValue) -> Result<i64, CommandError> {
    match reply {
        RespValue::Integer(n) => Ok(n),
        RespValue::Error(e) => Err(CommandError::Server(e)),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_optional_bulk(command: &'static str, reply: RespValue) -> Result<Option<Vec<u8>>, CommandError> {
    match reply {
        RespValue::BulkString(b) => Ok(Some(b)),
        RespValue::Null => Ok(None),
        RespValue::Error(e) => Err(CommandError::Server(e)),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_bulk_array(command: &'static str, reply: RespValue) -> Result<Vec<Vec<u8>>, CommandError> {
    match reply {
        RespValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                RespValue::BulkString(b) => Ok(b),
                other => Err(unexpected(command, &other)),
            })
            .collect(),
        RespValue::Error(e) => Err(CommandError::Server(e)),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_bulk_pairs(command: &'static str, reply: RespValue) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CommandError> {
    let flat = expect_bulk_array(command, reply)?;
    if flat.len() % 2 != 0 {
        return Err(CommandError::UnexpectedReply {
            command,
            reply: format!("odd-length array of {}", flat.len()),
        });
    }
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        pairs.push((a, b));
    }
    Ok(pairs)
}
