//! Authoritative balance reads pinned to a single block.
//!
//! # Protocol
//!
//! ```text
//!   eth_blockNumber ──► pin (fatal on failure, no reads issued)
//!          │
//!          ▼
//!   accounts.chunks(batch_size)          sequential
//!          │
//!          ▼
//!   balanceOf(account) @ pin             concurrent within a batch,
//!          │                             bounded by the shared in-flight semaphore
//!          ▼
//!   RetryPolicy per account              exhausted ──► failed (never aborts the run)
//! ```

use alloy_primitives::{Address, I256};
use futures::future::join_all;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ChainClient, RetryPolicy, RpcError};

/// Errors that are fatal to a verification pass.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The chain head could not be read, so there is no block to pin.
    #[error("failed to pin chain head: {0}")]
    PinFailed(#[source] RpcError),
}

/// Verifier tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifierConfig {
    /// Accounts per batch. `0` is treated as `1`.
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { batch_size: 100, retry: RetryPolicy::default() }
    }
}

/// Timing and retry statistics of one verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batch_count: usize,
    pub total_time: Duration,
    pub max_batch_time: Duration,
    pub retries_count: u64,
    pub failed_count: usize,
}

/// Result of [`RpcBalanceVerifier::verify`].
#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// Block every balance in `balances` was read at.
    pub block_number: u64,
    pub balances: HashMap<Address, I256>,
    /// Accounts that exhausted their retries or failed permanently.
    pub failed: Vec<Address>,
    pub stats: BatchStats,
}

/// Reads `balanceOf` for a set of accounts at one pinned block.
pub struct RpcBalanceVerifier {
    client: Arc<dyn ChainClient>,
    config: VerifierConfig,
    in_flight: Arc<Semaphore>,
}

impl RpcBalanceVerifier {
    /// Creates a verifier.
    ///
    /// `in_flight` bounds the number of concurrent balance reads and is meant to be
    /// shared by every verifier talking to the same provider.
    #[must_use]
    pub fn new(
        client: Arc<dyn ChainClient>,
        config: VerifierConfig,
        in_flight: Arc<Semaphore>,
    ) -> Self {
        Self { client, config, in_flight }
    }

    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Reads the chain head once. Used as the pin and by the planner.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::PinFailed`] when the head cannot be read within the
    /// retry policy.
    pub async fn chain_head(&self) -> Result<u64, VerifierError> {
        let client = &self.client;
        self.config
            .retry
            .run(|_| client.block_number())
            .await
            .result
            .map_err(VerifierError::PinFailed)
    }

    /// Reads authoritative balances of `accounts` of `token` at one pinned block.
    ///
    /// Individual account failures are reported in [`Verification::failed`]; only a
    /// failure to pin the block is an error.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::PinFailed`] if the chain head cannot be read.
    pub async fn verify(
        &self,
        token: Address,
        accounts: &[Address],
    ) -> Result<Verification, VerifierError> {
        let block_number = self.chain_head().await?;
        Ok(self.verify_at(token, accounts, block_number).await)
    }

    /// Reads authoritative balances of `accounts` of `token` at `block_number`.
    ///
    /// Used when the caller already holds the head it planned against, so that
    /// the reads and the admissibility of ledger values share one block.
    pub async fn verify_at(
        &self,
        token: Address,
        accounts: &[Address],
        block_number: u64,
    ) -> Verification {
        debug!(%token, block_number, accounts = accounts.len(), "pinned verification block");

        let started = Instant::now();
        let mut verification = Verification {
            block_number,
            balances: HashMap::with_capacity(accounts.len()),
            ..Verification::default()
        };

        for (index, batch) in accounts.chunks(self.config.batch_size.max(1)).enumerate() {
            let batch_started = Instant::now();

            let reads = batch.iter().map(|&account| self.read_balance(token, account, block_number));
            let results = join_all(reads).await;

            for (account, (result, retries)) in batch.iter().zip(results) {
                verification.stats.retries_count += u64::from(retries);
                match result {
                    Ok(balance) => {
                        verification.balances.insert(*account, balance);
                    }
                    Err(e) => {
                        warn!(%token, %account, block_number, error = %e, "balance read failed");
                        verification.failed.push(*account);
                    }
                }
            }

            let batch_time = batch_started.elapsed();
            verification.stats.batch_count += 1;
            verification.stats.max_batch_time = verification.stats.max_batch_time.max(batch_time);
            debug!(
                %token,
                batch = index,
                size = batch.len(),
                batch_time_ms = batch_time.as_millis() as u64,
                "verification batch complete"
            );
        }

        verification.stats.total_time = started.elapsed();
        verification.stats.failed_count = verification.failed.len();

        info!(
            %token,
            block_number,
            verified = verification.balances.len(),
            failed = verification.stats.failed_count,
            batches = verification.stats.batch_count,
            retries = verification.stats.retries_count,
            total_time_ms = verification.stats.total_time.as_millis() as u64,
            max_batch_time_ms = verification.stats.max_batch_time.as_millis() as u64,
            "verification pass complete"
        );

        verification
    }

    /// One account read with retries. Returns the outcome and the retry count.
    async fn read_balance(
        &self,
        token: Address,
        account: Address,
        block: u64,
    ) -> (Result<I256, RpcError>, u32) {
        let client = &self.client;
        let in_flight = &self.in_flight;

        let retried = self
            .config
            .retry
            .run(|_| async move {
                let _permit = in_flight.acquire().await.map_err(|_| {
                    RpcError::ConcurrencyLimit("verifier semaphore closed".to_string())
                })?;
                client.balance_of(token, account, block).await
            })
            .await;

        let retries = retried.retries();
        let result = retried.result.and_then(|raw| {
            I256::try_from(raw).map_err(|_| {
                RpcError::InvalidResponse(format!("balanceOf({account}) exceeds int256"))
            })
        });
        (result, retries)
    }
}
