//! valkey-migrate library
//!
//! One-shot migration of every key in a Valkey/Redis cluster to another
//! cluster, via an intermediate JSON export file.

pub mod client;
pub mod cluster;
pub mod config;
pub mod generator;
pub mod migrate;
pub mod utils;
