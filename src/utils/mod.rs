//! Utility modules

pub mod error;
pub mod resp;

pub use error::{
    CaptureError, ClusterError, CommandError, ConnectionError, MigrateError, NodeFailure,
    ProtocolError, RecordError, RestoreError, Result,
};
pub use resp::{RespDecoder, RespEncoder, RespValue};
