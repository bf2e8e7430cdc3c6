//! Durable backup of published snapshots: one JSON document per key.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StoreError;
use crate::types::{HolderRecord, SnapshotKey, TokenSnapshot};

/// On-disk shape of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub chain_id: u64,
    pub token: Address,
    pub updated_at: DateTime<Utc>,
    pub block_number: u64,
    pub holders: Vec<HolderRecord>,
}

impl From<&TokenSnapshot> for PersistedSnapshot {
    fn from(snapshot: &TokenSnapshot) -> Self {
        Self {
            chain_id: snapshot.chain_id,
            token: snapshot.token,
            updated_at: snapshot.generated_at,
            block_number: snapshot.block_number,
            holders: snapshot.holders.clone(),
        }
    }
}

impl From<PersistedSnapshot> for TokenSnapshot {
    fn from(persisted: PersistedSnapshot) -> Self {
        Self {
            chain_id: persisted.chain_id,
            token: persisted.token,
            block_number: persisted.block_number,
            generated_at: persisted.updated_at,
            holders: persisted.holders,
        }
    }
}

/// Snapshot files under a data directory, named `{chain_id}-0x{token}.json`.
///
/// Writes go to a sibling temp file which is then renamed over the target, so a
/// crash mid-write leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct SnapshotFileStore {
    data_dir: PathBuf,
}

impl SnapshotFileStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn path_for(&self, key: &SnapshotKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", key.file_stem()))
    }

    /// Writes `snapshot` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Serialization`] on failure.
    pub async fn write(&self, snapshot: &TokenSnapshot) -> Result<PathBuf, StoreError> {
        let key = snapshot.key();
        let path = self.path_for(&key);
        let tmp_path = self.data_dir.join(format!(".{}.json.tmp", key.file_stem()));

        let body = serde_json::to_vec(&PersistedSnapshot::from(snapshot))?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&tmp_path, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(%key, path = %path.display(), bytes = body.len(), "snapshot persisted");
        Ok(path)
    }

    /// Reads the snapshot of `key`. `Ok(None)` when no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on read failure and [`StoreError::Corrupt`] when the
    /// file does not hold a snapshot for `key`.
    pub async fn read(&self, key: &SnapshotKey) -> Result<Option<TokenSnapshot>, StoreError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt { path: path.clone(), reason: e.to_string() })?;

        if persisted.chain_id != key.chain_id || persisted.token != key.token {
            return Err(StoreError::Corrupt {
                path,
                reason: format!(
                    "file holds {}:{} instead of {key}",
                    persisted.chain_id, persisted.token
                ),
            });
        }

        Ok(Some(persisted.into()))
    }
}
