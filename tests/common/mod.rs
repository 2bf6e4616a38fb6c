//! In-memory cluster used by the integration tests
//!
//! Keys are spread over `n` fake primaries by hash slot. Keyed commands are
//! interpreted directly against a shared map; SCAN runs on per-node
//! connections. Knobs allow duplicate reporting across nodes, failing or
//! unreachable nodes, transient errors and corrupt sorted-set scores.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use valkey_migrate::client::ControlPlane;
use valkey_migrate::cluster::{ClusterAccess, ClusterNode, ClusterTopology};
use valkey_migrate::config::KeyPattern;
use valkey_migrate::utils::{CommandError, ConnectionError, RespValue};

const SLOTS: usize = 16384;

/// Value as held by the fake server
#[derive(Debug, Clone, PartialEq)]
pub enum Stored {
    Str(Vec<u8>),
    List(Vec<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    /// Sorted by (score, member)
    ZSet(Vec<(Vec<u8>, f64)>),
    /// Sorted by field
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    /// A type the migration does not support
    Stream(Vec<Vec<u8>>),
}

impl Stored {
    fn type_name(&self) -> &'static str {
        match self {
            Stored::Str(_) => "string",
            Stored::List(_) => "list",
            Stored::Set(_) => "set",
            Stored::ZSet(_) => "zset",
            Stored::Hash(_) => "hash",
            Stored::Stream(_) => "stream",
        }
    }

    pub fn hash(pairs: &[(&str, &str)]) -> Self {
        let mut fields: Vec<(Vec<u8>, Vec<u8>)> = pairs
            .iter()
            .map(|(f, v)| (f.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        fields.sort();
        Stored::Hash(fields)
    }

    pub fn set(members: &[&str]) -> Self {
        Stored::Set(members.iter().map(|m| m.as_bytes().to_vec()).collect())
    }

    pub fn list(items: &[&str]) -> Self {
        Stored::List(items.iter().map(|i| i.as_bytes().to_vec()).collect())
    }

    pub fn zset(members: &[(&str, f64)]) -> Self {
        let mut members: Vec<(Vec<u8>, f64)> = members
            .iter()
            .map(|(m, s)| (m.as_bytes().to_vec(), *s))
            .collect();
        sort_zset(&mut members);
        Stored::ZSet(members)
    }
}

fn sort_zset(members: &mut [(Vec<u8>, f64)]) {
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
}

// Fake DUMP format: tag byte, length-prefixed items, then a version trailer
const DUMP_TRAILER: &[u8] = b"\x0b\x00\xfe\xff";

fn put_item(out: &mut Vec<u8>, item: &[u8]) {
    out.extend_from_slice(&(item.len() as u32).to_be_bytes());
    out.extend_from_slice(item);
}

fn encode_dump(value: &Stored) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        Stored::Str(s) => {
            out.push(0);
            put_item(&mut out, s);
        }
        Stored::List(items) | Stored::Stream(items) => {
            out.push(if matches!(value, Stored::List(_)) { 1 } else { 5 });
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            items.iter().for_each(|i| put_item(&mut out, i));
        }
        Stored::Set(members) => {
            out.push(2);
            out.extend_from_slice(&(members.len() as u32).to_be_bytes());
            members.iter().for_each(|m| put_item(&mut out, m));
        }
        Stored::ZSet(members) => {
            out.push(3);
            out.extend_from_slice(&(members.len() as u32).to_be_bytes());
            for (m, s) in members {
                put_item(&mut out, m);
                out.extend_from_slice(&s.to_be_bytes());
            }
        }
        Stored::Hash(fields) => {
            out.push(4);
            out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
            for (f, v) in fields {
                put_item(&mut out, f);
                put_item(&mut out, v);
            }
        }
    }
    out.extend_from_slice(DUMP_TRAILER);
    out
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Some(head)
    }

    fn u32(&mut self) -> Option<usize> {
        let b = self.take(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    fn item(&mut self) -> Option<Vec<u8>> {
        let len = self.u32()?;
        self.take(len).map(|b| b.to_vec())
    }

    fn f64(&mut self) -> Option<f64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Some(f64::from_be_bytes(arr))
    }
}

fn decode_dump(payload: &[u8]) -> Option<Stored> {
    let body = payload.strip_suffix(DUMP_TRAILER)?;
    let mut r = Reader { buf: body };
    let tag = r.take(1)?[0];
    let value = match tag {
        0 => Stored::Str(r.item()?),
        1 | 5 => {
            let n = r.u32()?;
            let items = (0..n).map(|_| r.item()).collect::<Option<Vec<_>>>()?;
            if tag == 1 {
                Stored::List(items)
            } else {
                Stored::Stream(items)
            }
        }
        2 => {
            let n = r.u32()?;
            Stored::Set((0..n).map(|_| r.item()).collect::<Option<BTreeSet<_>>>()?)
        }
        3 => {
            let n = r.u32()?;
            let members = (0..n)
                .map(|_| Some((r.item()?, r.f64()?)))
                .collect::<Option<Vec<_>>>()?;
            Stored::ZSet(members)
        }
        4 => {
            let n = r.u32()?;
            let fields = (0..n)
                .map(|_| Some((r.item()?, r.item()?)))
                .collect::<Option<Vec<_>>>()?;
            Stored::Hash(fields)
        }
        _ => return None,
    };
    r.buf.is_empty().then_some(value)
}

fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    pub nodes: usize,
    /// Each node's SCAN also reports the next node's keys
    pub overlap: bool,
    /// This node fails after its first SCAN page
    pub failing_scan: Option<usize>,
    /// Connecting to this node fails
    pub unreachable: Option<usize>,
}

struct Inner {
    options: FakeOptions,
    data: Mutex<BTreeMap<Vec<u8>, Entry>>,
    log: Mutex<Vec<String>>,
    bad_scores: Mutex<BTreeSet<Vec<u8>>>,
    transient: Mutex<HashMap<Vec<u8>, u32>>,
}

#[derive(Clone)]
pub struct FakeCluster {
    inner: Arc<Inner>,
}

impl FakeCluster {
    pub fn new(nodes: usize) -> Self {
        Self::with_options(FakeOptions {
            nodes,
            ..FakeOptions::default()
        })
    }

    pub fn with_options(options: FakeOptions) -> Self {
        assert!(options.nodes > 0);
        Self {
            inner: Arc::new(Inner {
                options,
                data: Mutex::new(BTreeMap::new()),
                log: Mutex::new(Vec::new()),
                bad_scores: Mutex::new(BTreeSet::new()),
                transient: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn put(&self, key: &str, value: Stored, ttl: Option<Duration>) {
        self.inner.data.lock().insert(
            key.as_bytes().to_vec(),
            Entry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    pub fn put_string(&self, key: &str, value: &str) {
        self.put(key, Stored::Str(value.as_bytes().to_vec()), None);
    }

    pub fn value(&self, key: &str) -> Option<Stored> {
        self.inner.live(key.as_bytes(), |e| e.value.clone())
    }

    /// Remaining TTL in ms, None when persistent or missing
    pub fn ttl_ms(&self, key: &str) -> Option<u64> {
        self.inner
            .live(key.as_bytes(), |e| e.expires_at)
            .flatten()
            .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.data.lock().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner
            .data
            .lock()
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }

    /// Raw fake DUMP of a key, for byte-level comparisons
    pub fn dump_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.live(key.as_bytes(), |e| encode_dump(&e.value))
    }

    /// Make ZRANGE return a non-numeric score for `key`
    pub fn corrupt_scores(&self, key: &str) {
        self.inner.bad_scores.lock().insert(key.as_bytes().to_vec());
    }

    /// The next `times` keyed commands for `key` answer TRYAGAIN
    pub fn fail_transiently(&self, key: &str, times: u32) {
        self.inner
            .transient
            .lock()
            .insert(key.as_bytes().to_vec(), times);
    }

    /// Names of the keyed commands executed so far (SCAN excluded)
    pub fn commands(&self) -> Vec<String> {
        self.inner.log.lock().clone()
    }

    pub fn clear_log(&self) {
        self.inner.log.lock().clear();
    }

    pub fn node_of(&self, key: &[u8]) -> usize {
        self.inner.node_of(key)
    }
}

impl Inner {
    fn node_of(&self, key: &[u8]) -> usize {
        ClusterTopology::slot_for_key(key) as usize * self.options.nodes / SLOTS
    }

    fn node_range(&self, index: usize) -> (u16, u16) {
        let n = self.options.nodes;
        let start = (0..SLOTS).find(|s| s * n / SLOTS == index).unwrap_or(0);
        let end = (0..SLOTS).rev().find(|s| s * n / SLOTS == index).unwrap_or(0);
        (start as u16, end as u16)
    }

    /// Run `f` on a live entry, dropping it first if it has expired
    fn live<T>(&self, key: &[u8], f: impl FnOnce(&Entry) -> T) -> Option<T> {
        let mut data = self.data.lock();
        let expired = data
            .get(key)
            .and_then(|e| e.expires_at)
            .map_or(false, |at| at <= Instant::now());
        if expired {
            data.remove(key);
        }
        data.get(key).map(f)
    }

    fn scan(&self, node: usize, cursor: usize, pattern: &str, count: usize) -> (usize, Vec<Vec<u8>>) {
        let pattern = KeyPattern::new(pattern).unwrap_or_default();
        let next = (node + 1) % self.options.nodes;
        let keys: Vec<Vec<u8>> = self
            .data
            .lock()
            .keys()
            .filter(|k| {
                let owner = self.node_of(k);
                owner == node || (self.options.overlap && owner == next)
            })
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect();

        let end = (cursor + count).min(keys.len());
        let page = keys.get(cursor..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_cursor = if end >= keys.len() { 0 } else { end };
        (next_cursor, page)
    }

    fn dispatch(&self, args: &[&[u8]]) -> RespValue {
        let name = String::from_utf8_lossy(args[0]).to_uppercase();
        self.log.lock().push(name.clone());

        let key = args[1];
        if let Some(left) = self.transient.lock().get_mut(key) {
            if *left > 0 {
                *left -= 1;
                return RespValue::Error("TRYAGAIN injected".to_string());
            }
        }

        // Expire lazily before every command
        self.live(key, |_| ());
        let mut data = self.data.lock();

        let wrongtype = || RespValue::Error("WRONGTYPE Operation against a key holding the wrong kind of value".to_string());
        let ok = || RespValue::SimpleString("OK".to_string());
        let bulk_array = |items: Vec<Vec<u8>>| {
            RespValue::Array(items.into_iter().map(RespValue::BulkString).collect())
        };

        match name.as_str() {
            "PTTL" => RespValue::Integer(match data.get(key) {
                None => -2,
                Some(Entry { expires_at: None, .. }) => -1,
                Some(Entry { expires_at: Some(at), .. }) => {
                    at.saturating_duration_since(Instant::now()).as_millis() as i64
                }
            }),
            "TYPE" => RespValue::SimpleString(
                data.get(key)
                    .map_or("none", |e| e.value.type_name())
                    .to_string(),
            ),
            "DUMP" => data
                .get(key)
                .map_or(RespValue::Null, |e| RespValue::BulkString(encode_dump(&e.value))),
            "RESTORE" => {
                let ttl: u64 = parse_arg(args[2]).unwrap_or(0);
                let replace = args.get(4).map_or(false, |a| a.eq_ignore_ascii_case(b"REPLACE"));
                if data.contains_key(key) && !replace {
                    return RespValue::Error("BUSYKEY Target key name already exists.".to_string());
                }
                match decode_dump(args[3]) {
                    Some(value) => {
                        data.insert(key.to_vec(), Entry { value, expires_at: expiry(ttl) });
                        ok()
                    }
                    None => RespValue::Error("ERR DUMP payload version or checksum are wrong".to_string()),
                }
            }
            "GET" => match data.get(key).map(|e| &e.value) {
                None => RespValue::Null,
                Some(Stored::Str(s)) => RespValue::BulkString(s.clone()),
                Some(_) => wrongtype(),
            },
            "SET" => {
                let px = match args.get(3) {
                    Some(opt) if opt.eq_ignore_ascii_case(b"PX") => {
                        match args.get(4).and_then(|a| parse_arg::<u64>(a)) {
                            Some(ms) if ms > 0 => Some(ms),
                            _ => return RespValue::Error("ERR invalid expire time in 'set' command".to_string()),
                        }
                    }
                    _ => None,
                };
                data.insert(
                    key.to_vec(),
                    Entry {
                        value: Stored::Str(args[2].to_vec()),
                        expires_at: px.and_then(expiry),
                    },
                );
                ok()
            }
            "LRANGE" => match data.get(key).map(|e| &e.value) {
                None => RespValue::Array(Vec::new()),
                Some(Stored::List(items)) => bulk_array(items.clone()),
                Some(_) => wrongtype(),
            },
            "RPUSH" => {
                let entry = data.entry(key.to_vec()).or_insert_with(|| Entry {
                    value: Stored::List(Vec::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Stored::List(items) => {
                        items.extend(args[2..].iter().map(|a| a.to_vec()));
                        RespValue::Integer(items.len() as i64)
                    }
                    _ => wrongtype(),
                }
            }
            "SMEMBERS" => match data.get(key).map(|e| &e.value) {
                None => RespValue::Array(Vec::new()),
                Some(Stored::Set(members)) => bulk_array(members.iter().cloned().collect()),
                Some(_) => wrongtype(),
            },
            "SADD" => {
                let entry = data.entry(key.to_vec()).or_insert_with(|| Entry {
                    value: Stored::Set(BTreeSet::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Stored::Set(members) => {
                        let added = args[2..].iter().filter(|a| members.insert(a.to_vec())).count();
                        RespValue::Integer(added as i64)
                    }
                    _ => wrongtype(),
                }
            }
            "ZRANGE" => match data.get(key).map(|e| &e.value) {
                None => RespValue::Array(Vec::new()),
                Some(Stored::ZSet(members)) => {
                    let corrupt = self.bad_scores.lock().contains(key);
                    let mut flat = Vec::with_capacity(members.len() * 2);
                    for (m, s) in members {
                        flat.push(m.clone());
                        let score = if corrupt { "notanumber".to_string() } else { format_score(*s) };
                        flat.push(score.into_bytes());
                    }
                    bulk_array(flat)
                }
                Some(_) => wrongtype(),
            },
            "ZADD" => {
                let mut pairs = Vec::new();
                for chunk in args[2..].chunks(2) {
                    let score = std::str::from_utf8(chunk[0]).ok().and_then(|s| s.parse::<f64>().ok());
                    match (score, chunk.get(1)) {
                        (Some(score), Some(member)) if !score.is_nan() => pairs.push((member.to_vec(), score)),
                        _ => return RespValue::Error("ERR value is not a valid float".to_string()),
                    }
                }
                let entry = data.entry(key.to_vec()).or_insert_with(|| Entry {
                    value: Stored::ZSet(Vec::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Stored::ZSet(members) => {
                        let mut added = 0;
                        for (member, score) in pairs {
                            match members.iter_mut().find(|(m, _)| *m == member) {
                                Some(existing) => existing.1 = score,
                                None => {
                                    members.push((member, score));
                                    added += 1;
                                }
                            }
                        }
                        sort_zset(members);
                        RespValue::Integer(added)
                    }
                    _ => wrongtype(),
                }
            }
            "HGETALL" => match data.get(key).map(|e| &e.value) {
                None => RespValue::Array(Vec::new()),
                Some(Stored::Hash(fields)) => bulk_array(
                    fields
                        .iter()
                        .flat_map(|(f, v)| [f.clone(), v.clone()])
                        .collect(),
                ),
                Some(_) => wrongtype(),
            },
            "HSET" => {
                let entry = data.entry(key.to_vec()).or_insert_with(|| Entry {
                    value: Stored::Hash(Vec::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Stored::Hash(fields) => {
                        let mut added = 0;
                        for chunk in args[2..].chunks(2) {
                            let (field, value) = (chunk[0].to_vec(), chunk.get(1).map_or(Vec::new(), |v| v.to_vec()));
                            match fields.iter_mut().find(|(f, _)| *f == field) {
                                Some(existing) => existing.1 = value,
                                None => {
                                    fields.push((field, value));
                                    added += 1;
                                }
                            }
                        }
                        fields.sort();
                        RespValue::Integer(added)
                    }
                    _ => wrongtype(),
                }
            }
            "PEXPIRE" => {
                let ms: u64 = parse_arg(args[2]).unwrap_or(0);
                match data.get_mut(key) {
                    Some(entry) => {
                        entry.expires_at = Some(Instant::now() + Duration::from_millis(ms));
                        RespValue::Integer(1)
                    }
                    None => RespValue::Integer(0),
                }
            }
            "DEL" => RespValue::Integer(data.remove(key).map_or(0, |_| 1)),
            other => RespValue::Error(format!("ERR unknown command '{}'", other)),
        }
    }
}

fn parse_arg<T: std::str::FromStr>(raw: &[u8]) -> Option<T> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn expiry(ms: u64) -> Option<Instant> {
    (ms > 0).then(|| Instant::now() + Duration::from_millis(ms))
}

/// SCAN-only connection to one fake node
pub struct FakeNodeConn {
    inner: Arc<Inner>,
    index: usize,
    pages: usize,
}

impl ControlPlane for FakeNodeConn {
    fn execute_binary(&mut self, args: &[&[u8]]) -> io::Result<RespValue> {
        let parts: Vec<String> = args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        if parts.first().map(String::as_str) != Some("SCAN") || parts.len() != 6 {
            return Ok(RespValue::Error("ERR only SCAN cursor MATCH p COUNT n".to_string()));
        }

        if self.inner.options.failing_scan == Some(self.index) && self.pages > 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        }
        self.pages += 1;

        let cursor: usize = parts[1].parse().unwrap_or(0);
        let count: usize = parts[5].parse().unwrap_or(10);
        let (next, keys) = self.inner.scan(self.index, cursor, &parts[3], count);
        Ok(RespValue::Array(vec![
            RespValue::BulkString(next.to_string().into_bytes()),
            RespValue::Array(keys.into_iter().map(RespValue::BulkString).collect()),
        ]))
    }
}

impl ClusterAccess for FakeCluster {
    type NodeConn = FakeNodeConn;

    fn primaries(&self) -> Vec<ClusterNode> {
        (0..self.inner.options.nodes)
            .map(|i| ClusterNode {
                id: format!("fake-node-{}", i),
                host: "127.0.0.1".to_string(),
                port: 7000 + i as u16,
                is_primary: true,
                is_replica: false,
                primary_id: None,
                slot_ranges: vec![self.inner.node_range(i)],
                flags: vec!["master".to_string()],
                connected: true,
            })
            .collect()
    }

    fn open_node(&self, node: &ClusterNode) -> Result<FakeNodeConn, ConnectionError> {
        let index = (node.port - 7000) as usize;
        if self.inner.options.unreachable == Some(index) {
            return Err(ConnectionError::ConnectFailed {
                host: node.host.clone(),
                port: node.port,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        Ok(FakeNodeConn {
            inner: Arc::clone(&self.inner),
            index,
            pages: 0,
        })
    }

    fn execute_for_key(&self, key: &[u8], args: &[&[u8]]) -> Result<RespValue, CommandError> {
        assert_eq!(args.get(1).copied(), Some(key), "key must be the first argument");
        Ok(self.inner.dispatch(args))
    }
}
