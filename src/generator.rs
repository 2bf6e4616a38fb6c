//! Synthetic data generator for migration rehearsals
//!
//! Keys are named `<prefix>:<type>:<n>` and filled with plausible values
//! (user documents, sessions, event lists, product tags, leaderboards).
//! Each key is written with the same code path the import uses.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indicatif::ProgressBar;
use tracing::warn;

use crate::cluster::ClusterAccess;
use crate::migrate::{restore, CounterSummary, Expiry, KeyType, RunCounters, Snapshot, Value};

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez",
];
const CITIES: &[&str] = &[
    "NewYork", "London", "Tokyo", "Paris", "Berlin", "Sydney", "Toronto", "Mumbai", "Beijing",
    "Moscow",
];
const PRODUCTS: &[&str] = &[
    "Laptop", "Phone", "Tablet", "Camera", "Headphones", "Watch", "Keyboard", "Mouse", "Monitor",
    "Speaker",
];
const STATUSES: &[&str] = &[
    "active", "pending", "inactive", "suspended", "verified", "processing", "completed", "failed",
];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub prefix: String,
    pub count: u64,
    /// Types to draw from, uniformly
    pub types: Vec<KeyType>,
    /// TTL bounds in seconds; `max_ttl == 0` disables expiration
    pub min_ttl: u64,
    pub max_ttl: u64,
    pub string_size: usize,
    pub list_size: usize,
    pub set_size: usize,
    pub hash_fields: usize,
    pub zset_members: usize,
    /// Fixed seed for reproducible data
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefix: "test".to_string(),
            count: 1000,
            types: KeyType::ALL.to_vec(),
            min_ttl: 0,
            max_ttl: 0,
            string_size: 100,
            list_size: 10,
            set_size: 10,
            hash_fields: 5,
            zset_members: 10,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("--prefix must not be empty".to_string());
        }
        if self.types.is_empty() {
            return Err("--types must name at least one type".to_string());
        }
        if self.max_ttl > 0 && self.min_ttl > self.max_ttl {
            return Err("--min-ttl must not exceed --max-ttl".to_string());
        }
        let sizes = [
            ("--string-size", self.string_size),
            ("--list-size", self.list_size),
            ("--set-size", self.set_size),
            ("--hash-fields", self.hash_fields),
            ("--zset-members", self.zset_members),
        ];
        if let Some((flag, _)) = sizes.iter().find(|(_, n)| *n == 0) {
            return Err(format!("{} must be greater than 0", flag));
        }
        Ok(())
    }
}

/// Parse a comma-separated type list such as `string,hash,zset`
pub fn parse_types(list: &str) -> Result<Vec<KeyType>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| KeyType::from_name(t).ok_or_else(|| format!("unknown data type '{}'", t)))
        .collect()
}

/// Produces one snapshot per key index
pub struct KeyGenerator {
    config: GeneratorConfig,
    rng: fastrand::Rng,
}

impl KeyGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self { config, rng }
    }

    pub fn snapshot(&mut self, index: u64) -> Snapshot {
        let key_type = self.config.types[self.rng.usize(..self.config.types.len())];
        let key = format!("{}:{}:{}", self.config.prefix, key_type.as_str(), index).into_bytes();

        let value = match key_type {
            KeyType::String => Value::String(self.string_value(index).into_bytes()),
            KeyType::List => Value::List(
                (0..self.config.list_size)
                    .map(|i| format!("item_{}_{}", i, self.random_string(10)).into_bytes())
                    .collect(),
            ),
            KeyType::Set => Value::Set(
                (0..self.config.set_size)
                    .map(|_| {
                        format!("{}_{}", self.pick(PRODUCTS), self.rng.u32(..1000)).into_bytes()
                    })
                    .collect(),
            ),
            KeyType::Hash => Value::Hash(self.hash_fields(index)),
            KeyType::SortedSet => Value::SortedSet(
                (0..self.config.zset_members)
                    .map(|i| {
                        let member = format!("{}:{}", self.random_string(10), i).into_bytes();
                        (member, self.rng.u32(..1000) as f64)
                    })
                    .collect(),
            ),
        };

        let expiry = self.random_expiry();
        Snapshot::decomposed(key, expiry, value)
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items[self.rng.usize(..items.len())]
    }

    fn random_string(&mut self, len: usize) -> String {
        (0..len).map(|_| self.rng.alphanumeric()).collect()
    }

    fn string_value(&mut self, index: u64) -> String {
        match self.rng.u8(..5) {
            0 => format!(
                r#"{{"id":{},"name":"{} {}","email":"{}@example.com","age":{},"city":"{}"}}"#,
                index,
                self.pick(FIRST_NAMES),
                self.pick(LAST_NAMES),
                self.random_string(8),
                20 + self.rng.u32(..50),
                self.pick(CITIES)
            ),
            1 => format!("session_{}_{}", self.random_string(32), unix_now()),
            2 => self.rng.u32(..10_000).to_string(),
            3 => self.pick(STATUSES).to_string(),
            _ => self.random_string(self.config.string_size),
        }
    }

    fn hash_fields(&mut self, index: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
        let fields: Vec<(String, String)> = match self.rng.u8(..3) {
            0 => vec![
                ("id".into(), index.to_string()),
                ("username".into(), format!("{}{}", self.random_string(8), index)),
                ("email".into(), format!("{}@example.com", self.random_string(10))),
                ("created_at".into(), unix_now().to_string()),
                ("status".into(), self.pick(STATUSES).to_string()),
                ("login_count".into(), self.rng.u32(..1000).to_string()),
            ],
            1 => vec![
                ("product_id".into(), format!("PROD_{}", index)),
                ("name".into(), self.pick(PRODUCTS).to_string()),
                ("price".into(), format!("{:.2}", 10.0 + self.rng.f64() * 990.0)),
                ("stock".into(), self.rng.u32(..500).to_string()),
                ("category".into(), format!("cat_{}", self.rng.u32(..10))),
            ],
            _ => (0..self.config.hash_fields)
                .map(|i| (format!("field_{}", i), self.random_string(20)))
                .collect(),
        };
        fields
            .into_iter()
            .map(|(f, v)| (f.into_bytes(), v.into_bytes()))
            .collect()
    }

    fn random_expiry(&mut self) -> Expiry {
        if self.config.max_ttl == 0 {
            return Expiry::Persistent;
        }
        match self.rng.u64(self.config.min_ttl..=self.config.max_ttl) {
            0 => Expiry::Persistent,
            secs => Expiry::Remaining(Duration::from_secs(secs)),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write `config.count` generated keys; per-key failures are counted
pub fn generate<C>(cluster: &C, config: &GeneratorConfig, progress: &ProgressBar) -> CounterSummary
where
    C: ClusterAccess + ?Sized,
{
    let mut generator = KeyGenerator::new(config.clone());
    let counters = RunCounters::new();

    for index in 0..config.count {
        let snapshot = generator.snapshot(index);
        match restore(cluster, &snapshot) {
            Ok(()) => counters.record_success(),
            Err(e) => {
                warn!("Failed to generate {}: {}", snapshot.key_display(), e);
                counters.record_failure();
            }
        }
        progress.inc(1);
    }

    counters.summary()
}
