//! Endpoint list parsing

use std::fmt;

/// Resolved server address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Parse `host:port`, `[v6]:port`, or a bare host (defaults to 6379)
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty address".to_string());
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 address: {}", s))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p, s)?,
                None if tail.is_empty() => 6379,
                None => return Err(format!("invalid address: {}", s)),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => Ok(Self {
                host: host.to_string(),
                port: parse_port(port, s)?,
            }),
            Some(_) => Err(format!("missing host in address: {}", s)),
            None => Ok(Self {
                host: s.to_string(),
                port: 6379,
            }),
        }
    }
}

fn parse_port(port: &str, whole: &str) -> Result<u16, String> {
    port.parse()
        .map_err(|_| format!("invalid port in address: {}", whole))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a comma-separated endpoint list, skipping empty entries
pub fn parse_address_list(list: &str) -> Result<Vec<ServerAddress>, String> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(ServerAddress::parse)
        .collect()
}
