//! Reconciliation planning: which accounts need an authoritative on-chain read.
//!
//! On-chain reads are rate limited and slow. A ledger value is exact whenever the
//! account has no accrual source (no flow, no pool membership) and the ledger has
//! not indexed past the chain head we compare against. Everything else is verified.

use alloy_primitives::Address;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
    projection::{project, Projection},
    types::LedgerRecord,
};

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Ledger balance is exact at the chain head.
    Trusted,
    /// Needs a pinned `balanceOf` read.
    NeedsVerification,
}

/// Classifies one ledger record against the chain head.
#[must_use]
pub fn classify(record: &LedgerRecord, chain_head_block: u64) -> Classification {
    if !record.has_accrual_sources() && record.last_update_block <= chain_head_block {
        Classification::Trusted
    } else {
        Classification::NeedsVerification
    }
}

/// A ledger record together with its projection and classification.
#[derive(Debug, Clone)]
pub struct PlannedAccount {
    pub record: LedgerRecord,
    /// `None` when the projection overflowed; such accounts have no ledger fallback.
    pub projection: Option<Projection>,
    pub classification: Classification,
}

/// Partition of one token's ledger records.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationPlan {
    pub accounts: Vec<PlannedAccount>,
    /// Chain head the classification was made against.
    pub chain_head_block: u64,
    pub reference_timestamp: u64,
    /// Records dropped because another record for the same address superseded them.
    pub duplicates_dropped: usize,
}

impl ReconciliationPlan {
    /// Accounts that need a pinned on-chain read, in ledger order.
    #[must_use]
    pub fn needs_verification(&self) -> Vec<Address> {
        self.accounts
            .iter()
            .filter(|a| a.classification == Classification::NeedsVerification)
            .map(|a| a.record.account)
            .collect()
    }

    #[must_use]
    pub fn trusted_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.classification == Classification::Trusted).count()
    }
}

/// Builds a [`ReconciliationPlan`] for one token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationPlanner {
    verify_all: bool,
}

impl ReconciliationPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies every account as `NeedsVerification`, trading RPC volume for
    /// independence from the ledger's balances.
    #[must_use]
    pub fn verify_all(mut self, verify_all: bool) -> Self {
        self.verify_all = verify_all;
        self
    }

    /// Projects and classifies `records`.
    ///
    /// Records are de-duplicated by account first: the record with the highest
    /// `last_update_block` wins, ties broken by the highest ledger id.
    #[must_use]
    pub fn plan(
        &self,
        records: Vec<LedgerRecord>,
        chain_head_block: u64,
        reference_timestamp: u64,
    ) -> ReconciliationPlan {
        let total = records.len();
        let records = dedupe_by_account(records);
        let duplicates_dropped = total - records.len();
        if duplicates_dropped > 0 {
            warn!(duplicates_dropped, "ledger returned duplicate accounts");
        }

        let accounts = records
            .into_iter()
            .map(|record| {
                let projection = match project(&record, reference_timestamp) {
                    Ok(p) => {
                        if p.clamped {
                            debug!(
                                account = %record.account,
                                last_update_timestamp = record.last_update_timestamp,
                                reference_timestamp,
                                "ledger timestamp ahead of reference, accrual clamped"
                            );
                        }
                        Some(p)
                    }
                    Err(e) => {
                        warn!(account = %record.account, error = %e, "projection failed");
                        None
                    }
                };

                let classification = if self.verify_all || projection.is_none() {
                    Classification::NeedsVerification
                } else {
                    classify(&record, chain_head_block)
                };

                PlannedAccount { record, projection, classification }
            })
            .collect();

        ReconciliationPlan { accounts, chain_head_block, reference_timestamp, duplicates_dropped }
    }
}

fn dedupe_by_account(records: Vec<LedgerRecord>) -> Vec<LedgerRecord> {
    let mut index: HashMap<Address, usize> = HashMap::with_capacity(records.len());
    let mut kept: Vec<LedgerRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.account) {
            Some(&i) => {
                let current = &kept[i];
                if (record.last_update_block, &record.id) > (current.last_update_block, &current.id)
                {
                    kept[i] = record;
                }
            }
            None => {
                index.insert(record.account, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}
