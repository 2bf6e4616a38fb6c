//! Error types for valkey-migrate
//!
//! Fatal errors end a run (`MigrateError`). Per-key errors (`CaptureError`,
//! `RestoreError`) are counted and skipped by the migration passes.

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Discovery failed on {} node(s): {}", .failures.len(), format_node_failures(.failures))]
    Discovery { failures: Vec<NodeFailure> },

    #[error("Malformed export file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(
        "Export file was written with the {found} strategy but this run uses {expected} (first mismatch: key {key})"
    )]
    StrategyMismatch {
        expected: &'static str,
        found: &'static str,
        key: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A node that could not be scanned during discovery
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub node: String,
    pub reason: String,
}

fn format_node_failures(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.node, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("TLS handshake failed: {0}")]
    TlsFailed(String),

    #[error("No reachable seed among {0}")]
    NoReachableSeed(String),
}

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid RESP type byte: {0}")]
    InvalidType(u8),

    #[error("Invalid length: {0}")]
    InvalidLength(String),

    #[error("Invalid integer: {0}")]
    InvalidInteger(String),

    #[error("Missing CRLF terminator")]
    MissingTerminator,
}

impl From<ProtocolError> for io::Error {
    fn from(e: ProtocolError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

/// Cluster-related errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to parse CLUSTER NODES response: {0}")]
    ParseFailed(String),

    #[error("No primary nodes found in cluster")]
    NoPrimaries,

    #[error("Slot {0} has no assigned node")]
    UnassignedSlot(u16),

    #[error("Cluster topology refresh failed: {0}")]
    RefreshFailed(String),
}

/// Failure of a single keyed command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Unexpected {command} reply: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    #[error("Gave up after {0} redirects")]
    TooManyRedirects(usize),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

impl CommandError {
    /// Whether re-issuing the same command may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CommandError::Io(_) | CommandError::Connection(_) | CommandError::TooManyRedirects(_) => {
                true
            }
            CommandError::Server(msg) => {
                msg.starts_with("TRYAGAIN")
                    || msg.starts_with("LOADING")
                    || msg.starts_with("CLUSTERDOWN")
            }
            CommandError::Cluster(_) => true,
            CommandError::UnexpectedReply { .. } => false,
        }
    }
}

/// Per-key capture failure
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("key disappeared before it could be captured")]
    KeyVanished,

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl CaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Command(e) if e.is_transient())
    }
}

/// An export record that cannot be turned back into a snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("unsupported type tag: {0}")]
    UnknownType(String),

    #[error("negative ttl: {0}")]
    NegativeTtl(i64),

    #[error("record carries neither a value nor a dump")]
    MissingPayload,

    #[error("record carries both a value and a dump")]
    BothPayloads,

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("malformed {key_type} value: {reason}")]
    MalformedValue {
        key_type: &'static str,
        reason: String,
    },
}

/// Per-key restore failure
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("{0}")]
    Record(#[from] RecordError),

    #[error("empty {0} value cannot be written")]
    EmptyValue(&'static str),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl RestoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RestoreError::Command(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
