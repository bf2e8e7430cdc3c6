//! One snapshot run per (chain, token).
//!
//! # Stages
//!
//! ```text
//! Idle ─► Paginating ─► Projecting ─► Verifying ─► Assembling ─► Publishing ─► Idle
//!              │                          │
//!              └──────── error ───────────┴──► Idle (published snapshot untouched)
//! ```
//!
//! A key is run by at most one caller at a time; a concurrent call fails fast with
//! [`PipelineError::AlreadyRunning`] rather than queueing.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::{
    ledger::{LedgerError, LedgerPager, LedgerSource, DEFAULT_PAGE_SIZE},
    planner::ReconciliationPlanner,
    rpc::{BatchStats, ChainClient, RpcBalanceVerifier, VerifierConfig, VerifierError},
    snapshot::{AssemblyReport, SnapshotAssembler, SnapshotStore},
    types::SnapshotKey,
};

/// Where a key's current run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Idle,
    Paginating,
    Projecting,
    Verifying,
    Assembling,
    Publishing,
}

impl JobStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Paginating => "paginating",
            Self::Projecting => "projecting",
            Self::Verifying => "verifying",
            Self::Assembling => "assembling",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a run without publishing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("snapshot run for {0} is already in flight")]
    AlreadyRunning(SnapshotKey),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    ChainHead(#[from] VerifierError),
}

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub page_size: usize,
    pub verifier: VerifierConfig,
    pub verify_all: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, verifier: VerifierConfig::default(), verify_all: false }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub key: SnapshotKey,
    pub block_number: u64,
    pub ledger_records: usize,
    pub holders: usize,
    pub assembly: AssemblyReport,
    /// `None` when every account was trusted and no on-chain reads were made.
    pub verification: Option<BatchStats>,
    /// `false` when the snapshot was published but the durable write failed.
    pub persisted: bool,
    pub elapsed: Duration,
}

/// Runs snapshots for every token of one chain.
pub struct SnapshotPipeline {
    chain_id: u64,
    pager: LedgerPager,
    verifier: RpcBalanceVerifier,
    planner: ReconciliationPlanner,
    store: Arc<SnapshotStore>,
    in_flight: DashSet<SnapshotKey>,
    stages: DashMap<SnapshotKey, JobStage>,
}

/// Releases a key's in-flight slot and resets its stage, on every exit path.
struct RunGuard<'a> {
    pipeline: &'a SnapshotPipeline,
    key: SnapshotKey,
}

impl RunGuard<'_> {
    fn enter(&self, stage: JobStage) {
        self.pipeline.stages.insert(self.key, stage);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.stages.insert(self.key, JobStage::Idle);
        self.pipeline.in_flight.remove(&self.key);
    }
}

impl SnapshotPipeline {
    /// Creates a pipeline for `chain_id`.
    ///
    /// `in_flight_reads` bounds concurrent balance reads and is shared by every
    /// pipeline of the process.
    #[must_use]
    pub fn new(
        chain_id: u64,
        ledger: Arc<dyn LedgerSource>,
        chain: Arc<dyn ChainClient>,
        store: Arc<SnapshotStore>,
        config: PipelineConfig,
        in_flight_reads: Arc<Semaphore>,
    ) -> Self {
        Self {
            chain_id,
            pager: LedgerPager::new(ledger, config.page_size),
            verifier: RpcBalanceVerifier::new(chain, config.verifier, in_flight_reads),
            planner: ReconciliationPlanner::new().verify_all(config.verify_all),
            store,
            in_flight: DashSet::new(),
            stages: DashMap::new(),
        }
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Current stage of `key`; `Idle` when it never ran.
    #[must_use]
    pub fn stage(&self, key: &SnapshotKey) -> JobStage {
        self.stages.get(key).map_or(JobStage::Idle, |stage| *stage)
    }

    /// Runs a snapshot of `token` with the current wall clock as the projection time.
    ///
    /// # Errors
    ///
    /// See [`run_at`](Self::run_at).
    pub async fn run(&self, token: Address) -> Result<RunReport, PipelineError> {
        self.run_at(token, Utc::now()).await
    }

    /// Runs a snapshot of `token`, projecting ledger balances to `now`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyRunning`] if a run for the key is in flight
    /// - [`PipelineError::Ledger`] if pagination fails
    /// - [`PipelineError::ChainHead`] if the chain head cannot be read
    ///
    /// On error the previously published snapshot stays in place.
    pub async fn run_at(
        &self,
        token: Address,
        now: DateTime<Utc>,
    ) -> Result<RunReport, PipelineError> {
        let key = SnapshotKey::new(self.chain_id, token);
        if !self.in_flight.insert(key) {
            warn!(
                chain_id = self.chain_id,
                %token,
                stage = %self.stage(&key),
                "snapshot run already in flight"
            );
            return Err(PipelineError::AlreadyRunning(key));
        }
        let guard = RunGuard { pipeline: self, key };
        let started = Instant::now();

        let result = self.execute(&guard, token, now, started).await;
        if let Err(e) = &result {
            warn!(
                chain_id = self.chain_id,
                %token,
                stage = %self.stage(&key),
                error = %e,
                "snapshot run failed, keeping previous snapshot"
            );
        }
        result
    }

    async fn execute(
        &self,
        guard: &RunGuard<'_>,
        token: Address,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<RunReport, PipelineError> {
        let chain_id = self.chain_id;

        guard.enter(JobStage::Paginating);
        let records = self.pager.fetch_all(token).await?;
        let ledger_records = records.len();

        guard.enter(JobStage::Projecting);
        let chain_head = self.verifier.chain_head().await?;
        let reference_timestamp = u64::try_from(now.timestamp()).unwrap_or(0);
        let plan = self.planner.plan(records, chain_head, reference_timestamp);
        let to_verify = plan.needs_verification();
        info!(
            chain_id,
            %token,
            stage = %JobStage::Projecting,
            chain_head,
            trusted = plan.trusted_count(),
            needs_verification = to_verify.len(),
            "reconciliation planned"
        );

        let verification = if to_verify.is_empty() {
            None
        } else {
            guard.enter(JobStage::Verifying);
            Some(self.verifier.verify_at(token, &to_verify, chain_head).await)
        };

        guard.enter(JobStage::Assembling);
        let (snapshot, assembly) =
            SnapshotAssembler::new(chain_id, token).assemble(&plan, verification.as_ref(), now);
        let block_number = snapshot.block_number;
        let holders = snapshot.holders.len();

        guard.enter(JobStage::Publishing);
        let persisted = self.store.publish(snapshot).await.is_ok();

        let report = RunReport {
            key: guard.key,
            block_number,
            ledger_records,
            holders,
            assembly,
            verification: verification.map(|v| v.stats),
            persisted,
            elapsed: started.elapsed(),
        };

        info!(
            chain_id,
            %token,
            block_number,
            ledger_records,
            holders,
            trusted = assembly.trusted,
            verified = assembly.verified,
            unresolved = assembly.unresolved,
            dropped = assembly.dropped_non_positive,
            persisted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "snapshot run complete"
        );

        Ok(report)
    }
}
