//! Merges trusted ledger values with verified on-chain reads into a [`TokenSnapshot`].

use alloy_primitives::{Address, I256};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    planner::{Classification, ReconciliationPlan},
    rpc::Verification,
    types::{HolderRecord, TokenSnapshot},
};

/// How each ledger account was resolved.
///
/// `trusted` and `verified` count how accounts were resolved, including those later
/// counted in `dropped_non_positive`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub trusted: usize,
    pub verified: usize,
    /// Accounts with neither a verified read nor an admissible ledger value.
    pub unresolved: usize,
    /// Resolved accounts left out because their balance was zero or negative.
    pub dropped_non_positive: usize,
}

/// Builds the published holder list of one token.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotAssembler {
    chain_id: u64,
    token: Address,
}

impl SnapshotAssembler {
    #[must_use]
    pub fn new(chain_id: u64, token: Address) -> Self {
        Self { chain_id, token }
    }

    /// Assembles a snapshot from a plan and, when anything needed verification, the
    /// verifier's result.
    ///
    /// The snapshot's block is the verifier's pin, or the planning head when nothing
    /// was verified. A trusted ledger value is only used when its last update is at
    /// or below that block.
    #[must_use]
    pub fn assemble(
        &self,
        plan: &ReconciliationPlan,
        verification: Option<&Verification>,
        generated_at: DateTime<Utc>,
    ) -> (TokenSnapshot, AssemblyReport) {
        let block_number = verification.map_or(plan.chain_head_block, |v| v.block_number);
        let mut report = AssemblyReport::default();
        let mut holders = Vec::with_capacity(plan.accounts.len());

        for planned in &plan.accounts {
            let record = &planned.record;
            let verified = verification.and_then(|v| v.balances.get(&record.account)).copied();

            let balance = match (verified, planned.classification, &planned.projection) {
                (Some(balance), _, _) => {
                    report.verified += 1;
                    balance
                }
                (None, Classification::Trusted, Some(projection))
                    if record.last_update_block <= block_number =>
                {
                    report.trusted += 1;
                    projection.balance
                }
                _ => {
                    warn!(
                        chain_id = self.chain_id,
                        token = %self.token,
                        account = %record.account,
                        block_number,
                        "account unresolved, excluded from snapshot"
                    );
                    report.unresolved += 1;
                    continue;
                }
            };

            if balance <= I256::ZERO {
                report.dropped_non_positive += 1;
                continue;
            }

            let claimable_balance =
                planned.projection.map(|p| p.claimable).filter(|claimable| !claimable.is_zero());

            holders.push(HolderRecord {
                address: record.account,
                balance,
                net_flow_rate: record.net_flow_rate,
                claimable_balance,
            });
        }

        sort_holders(&mut holders);

        debug!(
            chain_id = self.chain_id,
            token = %self.token,
            block_number,
            holders = holders.len(),
            ?report,
            "snapshot assembled"
        );

        let snapshot = TokenSnapshot {
            chain_id: self.chain_id,
            token: self.token,
            block_number,
            generated_at,
            holders,
        };
        (snapshot, report)
    }
}

/// Balance descending, address ascending.
pub fn sort_holders(holders: &mut [HolderRecord]) {
    holders.sort_unstable_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.address.cmp(&b.address)));
}
