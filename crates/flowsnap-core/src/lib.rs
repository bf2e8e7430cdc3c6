//! # Flowsnap Core
//!
//! Snapshot engine for streaming-enabled tokens. Balances of such tokens move
//! every second (per-second flow rates, distribution pool memberships), so a plain
//! `balanceOf` sweep over transfer logs misses most of the picture. This crate
//! combines the streaming ledger's last-known state with authoritative on-chain
//! reads pinned to a single block and publishes an ordered holder list.
//!
//! - **[`ledger`]**: GraphQL ledger client and cursor pagination ([`ledger::LedgerPager`]).
//!
//! - **[`projection`]**: Pure balance projection from flow rates and pool accrual.
//!
//! - **[`planner`]**: Partitions accounts into ledger-trusted and needs-verification sets.
//!
//! - **[`rpc`]**: JSON-RPC chain client, retry policy and the pinned-block
//!   [`rpc::RpcBalanceVerifier`].
//!
//! - **[`snapshot`]**: Assembly of the final [`types::TokenSnapshot`], the in-memory
//!   [`snapshot::SnapshotStore`] and its durable backup.
//!
//! - **[`pipeline`]**: One end-to-end run per (chain, token) with single-flight protection.
//!
//! - **[`runtime`]**: Wiring from [`config::AppConfig`] to pipelines and schedulers.
//!
//! ## Pipeline
//!
//! ```text
//!   LedgerPager ──► BalanceProjector / ReconciliationPlanner
//!                              │
//!            ┌─────────────────┴─────────────────┐
//!            ▼                                   ▼
//!        Trusted                        NeedsVerification
//!   (projected balance)                          │
//!            │                                   ▼
//!            │                        RpcBalanceVerifier
//!            │                       (pin head, batches,
//!            │                        retry + backoff)
//!            └─────────────────┬─────────────────┘
//!                              ▼
//!                      SnapshotAssembler
//!                              │
//!                              ▼
//!                 SnapshotStore (atomic swap + disk)
//! ```

pub mod config;
pub mod ledger;
pub mod pipeline;
pub mod planner;
pub mod projection;
pub mod rpc;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
pub mod types;
pub mod utils;
