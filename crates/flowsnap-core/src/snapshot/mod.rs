//! Snapshot assembly, publication and durable backup.

pub mod assembler;
pub mod persistence;
pub mod store;

use std::path::PathBuf;
use thiserror::Error;

pub use assembler::{sort_holders, AssemblyReport, SnapshotAssembler};
pub use persistence::{PersistedSnapshot, SnapshotFileStore};
pub use store::SnapshotStore;

/// Errors raised by the snapshot store and its durable backup.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt snapshot file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("minimum balance must be a base-10 integer, got {0:?}")]
    InvalidMinBalance(String),
}
