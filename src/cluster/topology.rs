//! Cluster topology and slot mapping

use super::node::{parse_cluster_node_line, ClusterNode};
use crate::config::ServerAddress;
use crate::utils::ClusterError;

pub const SLOT_COUNT: usize = 16384;

/// Cluster topology snapshot
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    /// All nodes in the cluster
    pub nodes: Vec<ClusterNode>,
    /// Slot to node index mapping
    slot_map: Box<[Option<usize>]>,
    /// Indices of primaries that own at least one slot
    owner_indices: Vec<usize>,
}

impl ClusterTopology {
    /// Parse CLUSTER NODES response
    pub fn from_cluster_nodes(response: &str) -> Result<Self, ClusterError> {
        let nodes: Vec<ClusterNode> = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(parse_cluster_node_line)
            .collect();

        if nodes.is_empty() {
            return Err(ClusterError::ParseFailed(
                "no node lines in CLUSTER NODES reply".to_string(),
            ));
        }

        Self::from_nodes(nodes)
    }

    /// Topology of a non-clustered server
    pub fn standalone(address: &ServerAddress) -> Self {
        Self {
            nodes: vec![ClusterNode::standalone(address)],
            slot_map: vec![Some(0); SLOT_COUNT].into_boxed_slice(),
            owner_indices: vec![0],
        }
    }

    fn from_nodes(nodes: Vec<ClusterNode>) -> Result<Self, ClusterError> {
        let mut slot_map = vec![None; SLOT_COUNT].into_boxed_slice();
        let mut owner_indices = Vec::new();

        for (idx, node) in nodes.iter().enumerate() {
            if !node.owns_slots() {
                continue;
            }
            owner_indices.push(idx);
            for &(start, end) in &node.slot_ranges {
                for slot in start..=end {
                    slot_map[slot as usize] = Some(idx);
                }
            }
        }

        if owner_indices.is_empty() {
            return Err(ClusterError::NoPrimaries);
        }

        // Stable order: by first owned slot
        owner_indices.sort_by_key(|&idx| nodes[idx].slot_ranges.iter().map(|r| r.0).min());

        Ok(Self {
            nodes,
            slot_map,
            owner_indices,
        })
    }

    pub fn node_for_slot(&self, slot: u16) -> Option<&ClusterNode> {
        self.slot_map
            .get(slot as usize)
            .copied()
            .flatten()
            .map(|idx| &self.nodes[idx])
    }

    /// Primaries that own a share of the keyspace, ordered by first slot
    pub fn primaries(&self) -> impl Iterator<Item = &ClusterNode> {
        self.owner_indices.iter().map(|&idx| &self.nodes[idx])
    }

    pub fn num_primaries(&self) -> usize {
        self.owner_indices.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of slots with no owner
    pub fn unassigned_slots(&self) -> usize {
        self.slot_map.iter().filter(|s| s.is_none()).count()
    }

    /// Replace empty hosts (reported by a node about itself) with the seed host
    pub fn fill_missing_hosts(&mut self, seed_host: &str) {
        for node in &mut self.nodes {
            if node.host.is_empty() {
                node.host = seed_host.to_string();
            }
        }
    }

    /// Calculate slot for key using CRC16, honouring `{hash tags}`
    pub fn slot_for_key(key: &[u8]) -> u16 {
        if let Some(start) = key.iter().position(|&b| b == b'{') {
            if let Some(end) = key[start + 1..].iter().position(|&b| b == b'}') {
                if end > 0 {
                    return crc16(&key[start + 1..start + 1 + end]) % SLOT_COUNT as u16;
                }
            }
        }
        crc16(key) % SLOT_COUNT as u16
    }
}

/// CRC16 implementation for cluster slot calculation (XMODEM)
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
