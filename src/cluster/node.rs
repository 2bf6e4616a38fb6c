//! Cluster node representation

use crate::config::ServerAddress;

/// Cluster node information
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    /// Node ID from CLUSTER NODES
    pub id: String,
    /// Hostname or IP
    pub host: String,
    pub port: u16,
    pub is_primary: bool,
    pub is_replica: bool,
    /// Primary node ID (if replica)
    pub primary_id: Option<String>,
    /// Owned slot ranges, inclusive (primaries only)
    pub slot_ranges: Vec<(u16, u16)>,
    /// Node flags (myself, fail, handshake, ...)
    pub flags: Vec<String>,
    /// Link state reported as connected
    pub connected: bool,
}

impl ClusterNode {
    /// The single node of a non-clustered server; owns every slot
    pub fn standalone(address: &ServerAddress) -> Self {
        Self {
            id: "standalone".to_string(),
            host: address.host.clone(),
            port: address.port,
            is_primary: true,
            is_replica: false,
            primary_id: None,
            slot_ranges: vec![(0, 16383)],
            flags: vec!["master".to_string()],
            connected: true,
        }
    }

    /// A primary that currently owns part of the keyspace
    pub fn owns_slots(&self) -> bool {
        self.is_primary && !self.slot_ranges.is_empty()
    }

    pub fn address(&self) -> ServerAddress {
        ServerAddress {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Parse a line from CLUSTER NODES response
///
/// Format: `<id> <ip:port@cport[,hostname]> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> ... <slot>`
pub fn parse_cluster_node_line(line: &str) -> Option<ClusterNode> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }

    let (host, port) = parse_node_address(parts[1])?;
    let flags: Vec<String> = parts[2].split(',').map(String::from).collect();
    if flags.iter().any(|f| f == "noaddr") {
        return None;
    }

    let is_primary = flags.iter().any(|f| f == "master");
    let is_replica = flags.iter().any(|f| f == "slave" || f == "replica");

    let primary_id = if is_replica && parts[3] != "-" {
        Some(parts[3].to_string())
    } else {
        None
    };

    let slot_ranges = if is_primary {
        parts[8..].iter().filter_map(|s| parse_slot_range(s)).collect()
    } else {
        Vec::new()
    };

    Some(ClusterNode {
        id: parts[0].to_string(),
        host,
        port,
        is_primary,
        is_replica,
        primary_id,
        slot_ranges,
        flags,
        connected: parts[7] == "connected",
    })
}

/// Parse node address from CLUSTER NODES
/// Formats: "host:port@cport", "host:port", "host:port@cport,hostname"
fn parse_node_address(addr: &str) -> Option<(String, u16)> {
    let addr = addr.split(',').next().unwrap_or(addr);
    let host_port = addr.split('@').next().unwrap_or(addr);
    let (host, port) = host_port.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if port == 0 {
        return None;
    }
    Some((host.to_string(), port))
}

/// Parse slot range: "0-5460" or "0"
fn parse_slot_range(s: &str) -> Option<(u16, u16)> {
    // Migrating/importing markers like "[123->-node_id]" are not ownership
    if s.starts_with('[') {
        return None;
    }

    let (start, end) = match s.split_once('-') {
        Some((a, b)) => (a.parse().ok()?, b.parse().ok()?),
        None => {
            let slot: u16 = s.parse().ok()?;
            (slot, slot)
        }
    };
    (start <= end && end < 16384).then_some((start, end))
}
