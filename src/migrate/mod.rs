//! Migration engine
//!
//! - `discovery` / `key_set`: enumerate unique keys across all primaries
//! - `capture` / `restore`: per-key read and write, per-key failure isolation
//! - `archive`: the JSON export file
//! - `runner`: export and import runs with progress and counters

pub mod archive;
pub mod capture;
pub mod commands;
pub mod counters;
pub mod discovery;
pub mod key_set;
pub mod restore;
pub mod retry;
pub mod runner;
pub mod snapshot;

pub use archive::{load_import, read_export, write_export, DecodedRecord, ExportRecord};
pub use capture::{capture, capture_all};
pub use commands::KeyCommands;
pub use counters::{CounterSummary, RunCounters};
pub use discovery::{discover, DiscoveryOptions, DiscoveryReport, NodeScanStats};
pub use key_set::KeySet;
pub use restore::{restore, restore_all};
pub use retry::RetryPolicy;
pub use runner::{run_export, run_import, ExportOptions, ExportSummary, ImportOptions};
pub use snapshot::{Expiry, KeyType, Payload, Snapshot, Strategy, Value};
