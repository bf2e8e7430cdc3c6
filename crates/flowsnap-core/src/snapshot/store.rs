use alloy_primitives::Address;
use arc_swap::ArcSwap;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{info, warn};

use super::{sort_holders, SnapshotFileStore, StoreError};
use crate::{
    types::{HolderPage, HolderQuery, SnapshotKey, TokenSnapshot},
    utils::parse_decimal_i256,
};

type SnapshotMap = HashMap<SnapshotKey, Arc<TokenSnapshot>>;

/// Restores the holder ordering and uniqueness that `read` relies on.
///
/// Drops non-positive balances, keeps the largest balance per address and sorts.
/// Returns the number of rows removed.
fn normalize_holders(snapshot: &mut TokenSnapshot) -> usize {
    let before = snapshot.holders.len();
    snapshot.holders.retain(|holder| holder.balance.is_positive());
    sort_holders(&mut snapshot.holders);

    let mut seen = HashSet::with_capacity(snapshot.holders.len());
    snapshot.holders.retain(|holder| seen.insert(holder.address));

    before - snapshot.holders.len()
}

/// Latest published snapshot per (chain, token).
///
/// Uses `ArcSwap` over an immutable map: readers load the current map without
/// locking and clone the `Arc` of the snapshot they need, so a reader holds either
/// the previous snapshot or the new one in full. Publishing replaces the map via
/// read-copy-update.
pub struct SnapshotStore {
    snapshots: ArcSwap<SnapshotMap>,
    files: Option<SnapshotFileStore>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SnapshotStore {
    /// A store without durable backup.
    #[must_use]
    pub fn in_memory() -> Self {
        Self { snapshots: ArcSwap::from_pointee(HashMap::new()), files: None }
    }

    /// A store that persists every published snapshot under `files`.
    #[must_use]
    pub fn with_persistence(files: SnapshotFileStore) -> Self {
        Self { snapshots: ArcSwap::from_pointee(HashMap::new()), files: Some(files) }
    }

    /// Makes `snapshot` the current snapshot of its key, then writes it to disk.
    ///
    /// The in-memory swap always happens. An error means only the durable write
    /// failed; readers already see the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns the persistence error, if any.
    pub async fn publish(&self, snapshot: TokenSnapshot) -> Result<Arc<TokenSnapshot>, StoreError> {
        let key = snapshot.key();
        let snapshot = Arc::new(snapshot);

        self.swap_in(key, &snapshot);
        info!(
            %key,
            block_number = snapshot.block_number,
            holders = snapshot.holders.len(),
            "snapshot published"
        );

        if let Some(files) = &self.files {
            if let Err(e) = files.write(&snapshot).await {
                warn!(%key, error = %e, "snapshot published but not persisted");
                return Err(e);
            }
        }

        Ok(snapshot)
    }

    fn swap_in(&self, key: SnapshotKey, snapshot: &Arc<TokenSnapshot>) {
        self.snapshots.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(key, Arc::clone(snapshot));
            next
        });
    }

    /// Current snapshot of `key`.
    #[must_use]
    pub fn get(&self, key: &SnapshotKey) -> Option<Arc<TokenSnapshot>> {
        self.snapshots.load().get(key).cloned()
    }

    /// Keys with a published snapshot, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<SnapshotKey> {
        let mut keys: Vec<_> = self.snapshots.load().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Reads a filtered, windowed page of the current snapshot of `key`.
    ///
    /// `total` counts holders at or above `min_balance` before `offset` and `limit`
    /// are applied. `None` when nothing was published for `key`.
    #[must_use]
    pub fn read(&self, key: &SnapshotKey, query: &HolderQuery) -> Option<HolderPage> {
        let snapshot = self.get(key)?;

        // Holders are sorted by balance descending, so the filter is a prefix.
        let matching = snapshot.holders.partition_point(|h| h.balance >= query.min_balance);
        let holders = snapshot.holders[..matching]
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Some(HolderPage {
            block_number: snapshot.block_number,
            generated_at: snapshot.generated_at,
            total: matching,
            holders,
        })
    }

    /// Serves the holder list of `token` on `chain_id`.
    ///
    /// `min_balance_wei` is a base-10 integer string; absent means no filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidMinBalance`] when `min_balance_wei` is not an
    /// integer.
    pub fn list_holders(
        &self,
        chain_id: u64,
        token: Address,
        limit: usize,
        offset: usize,
        min_balance_wei: Option<&str>,
    ) -> Result<Option<HolderPage>, StoreError> {
        let min_balance = match min_balance_wei {
            Some(raw) => parse_decimal_i256(raw)
                .map_err(|_| StoreError::InvalidMinBalance(raw.to_string()))?,
            None => HolderQuery::default().min_balance,
        };

        let query = HolderQuery { limit, offset, min_balance };
        Ok(self.read(&SnapshotKey::new(chain_id, token), &query))
    }

    /// Hydrates `key` from durable storage.
    ///
    /// Returns `true` when a snapshot was loaded. A missing file is not an error;
    /// neither is a corrupt one, which is logged and skipped. A snapshot already in
    /// memory is never replaced by an older one from disk. Holders read from disk
    /// are re-sorted, deduplicated and stripped of non-positive balances.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the file exists but cannot be read.
    pub async fn load(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let Some(files) = &self.files else {
            return Ok(false);
        };

        let mut snapshot = match files.read(key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(false),
            Err(StoreError::Corrupt { path, reason }) => {
                warn!(%key, path = %path.display(), %reason, "skipping corrupt snapshot file");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if self.get(key).is_some_and(|current| current.block_number >= snapshot.block_number) {
            return Ok(false);
        }

        let removed = normalize_holders(&mut snapshot);
        if removed > 0 {
            warn!(%key, removed, "dropped non-positive or duplicate holders from snapshot file");
        }

        info!(
            %key,
            block_number = snapshot.block_number,
            holders = snapshot.holders.len(),
            "snapshot hydrated from disk"
        );
        self.swap_in(*key, &Arc::new(snapshot));
        Ok(true)
    }
}
