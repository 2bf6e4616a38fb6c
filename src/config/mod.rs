//! Configuration module

pub mod address;
pub mod cli;
pub mod migrate_config;
pub mod pattern;
pub mod tls_config;

pub use address::{parse_address_list, ServerAddress};
pub use cli::CliArgs;
pub use migrate_config::{AuthConfig, ClusterEndpoint, MigrateConfig, RunMode};
pub use pattern::KeyPattern;
pub use tls_config::TlsConfig;
