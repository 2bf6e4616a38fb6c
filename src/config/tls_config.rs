//! TLS configuration

use std::path::PathBuf;

/// TLS settings for one side of the migration
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub skip_verify: bool,
    pub ca_cert: Option<PathBuf>,
    pub sni: Option<String>,
}
