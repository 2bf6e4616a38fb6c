//! Cluster topology and routing
//!
//! - Topology discovery via CLUSTER NODES (standalone servers become a
//!   single-owner topology)
//! - Slot mapping and CRC16 calculation
//! - Keyed command routing with MOVED/ASK handling

pub mod client;
pub mod node;
pub mod topology;

pub use client::{ClusterAccess, ClusterClient, RedirectInfo, MAX_REDIRECTS};
pub use node::ClusterNode;
pub use topology::ClusterTopology;
