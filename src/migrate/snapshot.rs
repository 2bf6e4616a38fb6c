//! Snapshot data model: the unit of migration
//!
//! Expiries travel as signed nanoseconds, so a remaining TTL longer than
//! `i64::MAX` ns (about 292 years) is clamped on export.

use std::fmt;
use std::time::Duration;

/// Data types that can be migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    List,
    Set,
    SortedSet,
    Hash,
}

impl KeyType {
    pub const ALL: [KeyType; 5] = [
        KeyType::String,
        KeyType::List,
        KeyType::Set,
        KeyType::SortedSet,
        KeyType::Hash,
    ];

    /// Name as reported by the TYPE command
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Hash => "hash",
        }
    }

    /// Parse a TYPE reply; None for anything outside the supported set
    pub fn from_name(name: &str) -> Option<Self> {
        KeyType::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining time to live at capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Persistent,
    Remaining(Duration),
}

impl Expiry {
    /// Interpret a PTTL reply that is not -2 (missing key).
    /// Negative values mean no expiration; 0 is clamped to 1ms so it stays
    /// distinguishable from the persistent sentinel.
    pub fn from_pttl(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Expiry::Persistent,
            0 => Expiry::Remaining(Duration::from_millis(1)),
            ms => Expiry::Remaining(Duration::from_millis(ms as u64)),
        }
    }

    /// Wire form: nanoseconds, 0 for persistent
    pub fn as_nanos(&self) -> i64 {
        match self {
            Expiry::Persistent => 0,
            Expiry::Remaining(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX).max(1),
        }
    }

    /// Whether `as_nanos` has to clamp this expiry
    pub fn exceeds_wire_range(&self) -> bool {
        matches!(self, Expiry::Remaining(d) if d.as_nanos() > i64::MAX as u128)
    }

    /// Inverse of `as_nanos`; negative input is rejected
    pub fn from_nanos(nanos: i64) -> Option<Self> {
        match nanos {
            n if n < 0 => None,
            0 => Some(Expiry::Persistent),
            n => Some(Expiry::Remaining(Duration::from_nanos(n as u64))),
        }
    }

    /// Milliseconds to pass to PX/PEXPIRE/RESTORE, never 0 for an expiring key
    pub fn write_millis(&self) -> Option<u64> {
        match self {
            Expiry::Persistent => None,
            Expiry::Remaining(d) => Some(u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)),
        }
    }
}

/// How values are captured and restored for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Engine-native DUMP / RESTORE payloads
    Dump,
    /// Type-aware structural values
    Decomposed,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Dump => "dump",
            Strategy::Decomposed => "decomposed",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decomposed value, one variant per supported type
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    /// Ordered elements
    List(Vec<Vec<u8>>),
    /// Unordered members
    Set(Vec<Vec<u8>>),
    /// (member, score) pairs in ascending score order
    SortedSet(Vec<(Vec<u8>, f64)>),
    /// Unordered field -> value pairs
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
}

impl Value {
    pub fn key_type(&self) -> KeyType {
        match self {
            Value::String(_) => KeyType::String,
            Value::List(_) => KeyType::List,
            Value::Set(_) => KeyType::Set,
            Value::SortedSet(_) => KeyType::SortedSet,
            Value::Hash(_) => KeyType::Hash,
        }
    }

    /// Number of elements (1 for strings)
    pub fn len(&self) -> usize {
        match self {
            Value::String(_) => 1,
            Value::List(items) | Value::Set(items) => items.len(),
            Value::SortedSet(members) => members.len(),
            Value::Hash(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Opaque(Vec<u8>),
    Decomposed(Value),
}

impl Payload {
    pub fn strategy(&self) -> Strategy {
        match self {
            Payload::Opaque(_) => Strategy::Dump,
            Payload::Decomposed(_) => Strategy::Decomposed,
        }
    }
}

/// One captured key
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    key: Vec<u8>,
    key_type: KeyType,
    expiry: Expiry,
    payload: Payload,
}

impl Snapshot {
    pub fn opaque(key: Vec<u8>, key_type: KeyType, expiry: Expiry, dump: Vec<u8>) -> Self {
        Self {
            key,
            key_type,
            expiry,
            payload: Payload::Opaque(dump),
        }
    }

    /// The type tag always follows the value's variant
    pub fn decomposed(key: Vec<u8>, expiry: Expiry, value: Value) -> Self {
        Self {
            key,
            key_type: value.key_type(),
            expiry,
            payload: Payload::Decomposed(value),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Key rendered for log lines
    pub fn key_display(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn strategy(&self) -> Strategy {
        self.payload.strategy()
    }
}
