//! Concurrent dedup set for discovered keys

use dashmap::DashSet;

/// Keys seen so far by any node scan.
///
/// Scans of different nodes may report the same key (replica overlap,
/// resharding in flight); `add` tells the caller whether the key is new.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: DashSet<Vec<u8>>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key`; returns false when it was already present
    pub fn add(&self, key: Vec<u8>) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drain into a sorted vector so export order is stable
    pub fn into_keys(self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self.keys.into_iter().collect();
        keys.sort_unstable();
        keys
    }
}
