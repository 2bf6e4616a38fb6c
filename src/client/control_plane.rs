//! Control plane trait for per-node communication
//!
//! Abstracts the commands that are addressed to a specific node rather than
//! routed by key: PING, AUTH, CLUSTER NODES, ASKING and SCAN. `RawConnection`
//! implements it over a socket; tests implement it with scripted replies.

use crate::utils::RespValue;
use std::io;

/// One page of a SCAN iteration
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    /// Cursor for the next call; 0 when the iteration is complete
    pub cursor: u64,
    pub keys: Vec<Vec<u8>>,
}

/// Control plane operations trait
pub trait ControlPlane {
    /// Execute a command with binary arguments
    fn execute_binary(&mut self, args: &[&[u8]]) -> io::Result<RespValue>;

    /// Execute a command with string arguments
    fn execute(&mut self, args: &[&str]) -> io::Result<RespValue> {
        let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.execute_binary(&byte_args)
    }
}

fn server_error(e: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn unexpected(command: &str, reply: &RespValue) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Unexpected {} response: {}", command, reply.describe()),
    )
}

/// Convenience methods built on top of `ControlPlane`
pub trait ControlPlaneExt: ControlPlane {
    /// Send PING and verify PONG response
    fn ping(&mut self) -> io::Result<bool> {
        match self.execute(&["PING"])? {
            RespValue::SimpleString(s) => Ok(s == "PONG"),
            RespValue::Error(e) => Err(server_error(e)),
            _ => Ok(false),
        }
    }

    /// Get CLUSTER NODES response as string
    fn cluster_nodes(&mut self) -> io::Result<String> {
        match self.execute(&["CLUSTER", "NODES"])? {
            RespValue::BulkString(data) => String::from_utf8(data).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))
            }),
            RespValue::Error(e) => Err(server_error(e)),
            other => Err(unexpected("CLUSTER NODES", &other)),
        }
    }

    /// Send AUTH command
    fn authenticate(&mut self, password: &str, username: Option<&str>) -> io::Result<()> {
        let response = match username {
            Some(user) => self.execute(&["AUTH", user, password])?,
            None => self.execute(&["AUTH", password])?,
        };

        match response {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::PermissionDenied, e)),
            other => Err(unexpected("AUTH", &other)),
        }
    }

    /// Send ASKING before a command redirected by an ASK error
    fn asking(&mut self) -> io::Result<()> {
        match self.execute(&["ASKING"])? {
            reply if reply.is_ok() => Ok(()),
            RespValue::Error(e) => Err(server_error(e)),
            other => Err(unexpected("ASKING", &other)),
        }
    }

    /// One SCAN round trip: `SCAN cursor MATCH pattern COUNT count`
    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> io::Result<ScanPage> {
        let cursor_str = cursor.to_string();
        let count_str = count.to_string();
        let reply = self.execute(&["SCAN", &cursor_str, "MATCH", pattern, "COUNT", &count_str])?;

        let mut parts = match reply {
            RespValue::Array(parts) if parts.len() == 2 => parts,
            RespValue::Error(e) => return Err(server_error(e)),
            other => return Err(unexpected("SCAN", &other)),
        };

        let keys_reply = parts.pop().unwrap_or(RespValue::Null);
        let cursor_reply = parts.pop().unwrap_or(RespValue::Null);

        let cursor = match &cursor_reply {
            RespValue::BulkString(_) | RespValue::SimpleString(_) => cursor_reply
                .as_str()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| unexpected("SCAN cursor", &cursor_reply))?,
            RespValue::Integer(i) if *i >= 0 => *i as u64,
            other => return Err(unexpected("SCAN cursor", other)),
        };

        let keys = match keys_reply {
            RespValue::Array(items) => items
                .into_iter()
                .map(|k| match k {
                    RespValue::BulkString(b) => Ok(b),
                    other => Err(unexpected("SCAN key", &other)),
                })
                .collect::<io::Result<Vec<_>>>()?,
            other => return Err(unexpected("SCAN keys", &other)),
        };

        Ok(ScanPage { cursor, keys })
    }
}

// Blanket implementation: any ControlPlane automatically gets ControlPlaneExt
impl<T: ControlPlane + ?Sized> ControlPlaneExt for T {}
