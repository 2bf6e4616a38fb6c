//! Slot-routing cluster client
//!
//! `ClusterAccess` is the seam between the migration engine and the network:
//! enumerate shard owners, open a dedicated connection to one of them, and run
//! a keyed command on whichever node owns the key. `ClusterClient` is the
//! production implementation over `RawConnection`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::node::ClusterNode;
use super::topology::ClusterTopology;
use crate::client::{ConnectionFactory, ControlPlane, ControlPlaneExt, RawConnection};
use crate::config::{ClusterEndpoint, ServerAddress};
use crate::utils::{ClusterError, CommandError, ConnectionError, MigrateError, RespValue};

/// Redirect hops followed for a single command
pub const MAX_REDIRECTS: usize = 5;

/// Capabilities the migration engine needs from a cluster
pub trait ClusterAccess {
    /// Dedicated per-node connection used for SCAN
    type NodeConn: ControlPlane + Send;

    /// Shard-owning primaries; replicas are never returned
    fn primaries(&self) -> Vec<ClusterNode>;

    fn open_node(&self, node: &ClusterNode) -> Result<Self::NodeConn, ConnectionError>;

    /// Run `args` on the node owning `key`, following redirects.
    /// Server error replies other than redirects are returned as `RespValue::Error`.
    fn execute_for_key(&self, key: &[u8], args: &[&[u8]]) -> Result<RespValue, CommandError>;
}

/// Redirect information parsed from MOVED/ASK error
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectInfo {
    pub slot: u16,
    pub target: ServerAddress,
    /// ASK redirects need an ASKING prefix and do not change the slot owner
    pub is_ask: bool,
}

impl RedirectInfo {
    /// Parse from error message like "MOVED 3999 127.0.0.1:7001" or "ASK 3999 127.0.0.1:7001"
    pub fn parse(error_msg: &str) -> Option<Self> {
        let mut parts = error_msg.split_whitespace();
        let is_ask = match parts.next()? {
            "ASK" => true,
            "MOVED" => false,
            _ => return None,
        };
        let slot: u16 = parts.next()?.parse().ok()?;
        let (host, port) = parts.next()?.rsplit_once(':')?;
        let port: u16 = port.parse().ok()?;

        Some(Self {
            slot,
            target: ServerAddress {
                host: host.to_string(),
                port,
            },
            is_ask,
        })
    }
}

type SharedConnection = Arc<Mutex<RawConnection>>;

/// Cluster client with slot routing and a per-node connection cache
pub struct ClusterClient {
    factory: ConnectionFactory,
    seeds: Vec<ServerAddress>,
    topology: RwLock<ClusterTopology>,
    connections: Mutex<HashMap<ServerAddress, SharedConnection>>,
    cluster_mode: bool,
}

impl ClusterClient {
    /// Connect to the first reachable seed and load the topology
    pub fn connect(endpoint: &ClusterEndpoint) -> Result<Self, MigrateError> {
        let factory = ConnectionFactory::for_endpoint(endpoint);
        let mut last_error = None;

        for seed in &endpoint.addresses {
            let mut conn = match factory.create(&seed.host, seed.port) {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Seed {} unreachable: {}", seed, e);
                    last_error = Some(e);
                    continue;
                }
            };

            if let Err(e) = conn.ping() {
                warn!("Seed {} did not answer PING: {}", seed, e);
                continue;
            }

            let (topology, cluster_mode) = match conn.cluster_nodes() {
                Ok(text) => {
                    let mut topology = ClusterTopology::from_cluster_nodes(&text)?;
                    topology.fill_missing_hosts(&seed.host);
                    (topology, true)
                }
                Err(e) if e.to_string().contains("cluster support disabled") => {
                    info!("{} is not clustered, using standalone mode", seed);
                    (ClusterTopology::standalone(seed), false)
                }
                Err(e) => {
                    warn!("CLUSTER NODES failed on {}: {}", seed, e);
                    continue;
                }
            };

            if topology.unassigned_slots() > 0 {
                warn!(
                    "{} slots have no owner; keys in them cannot be routed",
                    topology.unassigned_slots()
                );
            }
            info!(
                "Topology from {}: {} primaries, {} total nodes",
                seed,
                topology.num_primaries(),
                topology.num_nodes()
            );

            let mut connections = HashMap::new();
            connections.insert(seed.clone(), Arc::new(Mutex::new(conn)));

            return Ok(Self {
                factory,
                seeds: endpoint.addresses.clone(),
                topology: RwLock::new(topology),
                connections: Mutex::new(connections),
                cluster_mode,
            });
        }

        match last_error {
            Some(e) if endpoint.addresses.len() == 1 => Err(e.into()),
            _ => Err(ConnectionError::NoReachableSeed(endpoint.describe()).into()),
        }
    }

    pub fn num_primaries(&self) -> usize {
        self.topology.read().num_primaries()
    }

    /// Reload CLUSTER NODES after a MOVED redirect
    fn refresh_topology(&self) -> Result<(), ClusterError> {
        if !self.cluster_mode {
            return Ok(());
        }

        let mut candidates = self.seeds.clone();
        candidates.extend(
            self.topology
                .read()
                .primaries()
                .map(|n| n.address())
                .filter(|a| !self.seeds.contains(a)),
        );

        for addr in candidates {
            let fetched = self
                .factory
                .create(&addr.host, addr.port)
                .map_err(|e| e.to_string())
                .and_then(|mut conn| conn.cluster_nodes().map_err(|e| e.to_string()))
                .and_then(|text| ClusterTopology::from_cluster_nodes(&text).map_err(|e| e.to_string()));

            match fetched {
                Ok(mut topology) => {
                    topology.fill_missing_hosts(&addr.host);
                    info!(
                        "Cluster topology refreshed: {} primaries, {} total nodes",
                        topology.num_primaries(),
                        topology.num_nodes()
                    );
                    *self.topology.write() = topology;
                    return Ok(());
                }
                Err(e) => debug!("Topology refresh via {} failed: {}", addr, e),
            }
        }

        Err(ClusterError::RefreshFailed(
            "no node returned a usable CLUSTER NODES reply".to_string(),
        ))
    }

    fn connection(&self, addr: &ServerAddress) -> Result<SharedConnection, ConnectionError> {
        if let Some(conn) = self.connections.lock().get(addr) {
            return Ok(Arc::clone(conn));
        }

        let conn = Arc::new(Mutex::new(self.factory.create(&addr.host, addr.port)?));
        self.connections
            .lock()
            .insert(addr.clone(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Forget a connection after an I/O error so the next command reconnects
    fn drop_connection(&self, addr: &ServerAddress) {
        self.connections.lock().remove(addr);
    }

    fn owner_of(&self, key: &[u8]) -> Result<ServerAddress, ClusterError> {
        let slot = ClusterTopology::slot_for_key(key);
        self.topology
            .read()
            .node_for_slot(slot)
            .map(|n| n.address())
            .ok_or(ClusterError::UnassignedSlot(slot))
    }
}

impl ClusterAccess for ClusterClient {
    type NodeConn = RawConnection;

    fn primaries(&self) -> Vec<ClusterNode> {
        self.topology.read().primaries().cloned().collect()
    }

    fn open_node(&self, node: &ClusterNode) -> Result<RawConnection, ConnectionError> {
        self.factory.create(&node.host, node.port)
    }

    fn execute_for_key(&self, key: &[u8], args: &[&[u8]]) -> Result<RespValue, CommandError> {
        let mut target = self.owner_of(key)?;
        let mut asking = false;

        for _ in 0..=MAX_REDIRECTS {
            let conn = self.connection(&target)?;
            let result = {
                let mut conn = conn.lock();
                if asking {
                    conn.asking().and_then(|_| conn.execute_binary(args))
                } else {
                    conn.execute_binary(args)
                }
            };

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    self.drop_connection(&target);
                    return Err(e.into());
                }
            };

            let redirect = match &reply {
                RespValue::Error(msg) => RedirectInfo::parse(msg),
                _ => None,
            };
            let Some(redirect) = redirect else {
                return Ok(reply);
            };

            debug!(
                "{} redirect for slot {} to {}",
                if redirect.is_ask { "ASK" } else { "MOVED" },
                redirect.slot,
                redirect.target
            );
            if !redirect.is_ask {
                if let Err(e) = self.refresh_topology() {
                    warn!("{}", e);
                }
            }
            asking = redirect.is_ask;
            target = redirect.target;
        }

        Err(CommandError::TooManyRedirects(MAX_REDIRECTS))
    }
}
