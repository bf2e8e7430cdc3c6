//! Core type definitions for ledger records, snapshots and JSON-RPC.
//!
//! # Type Categories
//!
//! ## Snapshot Domain Types
//! - [`LedgerRecord`], [`PoolMembership`]: validated ledger state for one account
//! - [`HolderRecord`], [`TokenSnapshot`]: published, immutable output of a run
//! - [`SnapshotKey`]: composite `(chain_id, token)` key for every per-token table
//! - [`HolderQuery`], [`HolderPage`]: read-side request and response
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: protocol conformance
//!
//! All monetary values are [`I256`] and are serialized as base-10 strings.

use alloy_primitives::{Address, I256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, sync::Arc};

use crate::utils::quantity::{decimal, decimal_opt};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for JSON-RPC version - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Composite key identifying one token on one chain.
///
/// Every per-token table (published snapshots, in-flight runs, job stages, files on
/// disk) is keyed by this type rather than by a formatted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotKey {
    pub chain_id: u64,
    pub token: Address,
}

impl SnapshotKey {
    #[must_use]
    pub fn new(chain_id: u64, token: Address) -> Self {
        Self { chain_id, token }
    }

    /// File stem used for the durable record of this key, e.g. `137-0x3ad7...`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{}-0x{}", self.chain_id, hex::encode(self.token))
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.token)
    }
}

/// An account's stake in a distribution pool of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMembership {
    pub pool: Address,
    /// Units streamed per second for every unit held.
    pub per_unit_flow_rate: I256,
    pub units_held: I256,
    /// Connected memberships count toward the spendable balance; disconnected ones
    /// accrue into a claimable balance.
    pub connected: bool,
}

/// Validated ledger state for one account of one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    /// Ledger record id, used as the pagination cursor.
    pub id: String,
    pub account: Address,
    pub ledger_balance: I256,
    pub net_flow_rate: I256,
    pub last_update_timestamp: u64,
    pub last_update_block: u64,
    pub pool_memberships: Vec<PoolMembership>,
}

impl LedgerRecord {
    /// Returns `true` when the balance can change without a new ledger update.
    #[must_use]
    pub fn has_accrual_sources(&self) -> bool {
        !self.net_flow_rate.is_zero() || !self.pool_memberships.is_empty()
    }
}

/// One holder line in a published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderRecord {
    pub address: Address,
    #[serde(with = "decimal")]
    pub balance: I256,
    #[serde(with = "decimal")]
    pub net_flow_rate: I256,
    #[serde(with = "decimal_opt", default, skip_serializing_if = "Option::is_none")]
    pub claimable_balance: Option<I256>,
}

/// Complete, sorted, zero-filtered holder list for one token at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub chain_id: u64,
    pub token: Address,
    /// Every balance in this snapshot is attributable to this block.
    pub block_number: u64,
    pub generated_at: DateTime<Utc>,
    pub holders: Vec<HolderRecord>,
}

impl TokenSnapshot {
    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.chain_id, self.token)
    }
}

/// Read-side filter and window over a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderQuery {
    pub limit: usize,
    pub offset: usize,
    /// Inclusive lower bound on `balance`.
    pub min_balance: I256,
}

impl Default for HolderQuery {
    fn default() -> Self {
        Self { limit: 100, offset: 0, min_balance: I256::ZERO }
    }
}

/// A page of holders served from the latest published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderPage {
    pub block_number: u64,
    pub generated_at: DateTime<Utc>,
    /// Holders matching the balance filter, before `offset`/`limit` are applied.
    pub total: usize,
    pub holders: Vec<HolderRecord>,
}

/// JSON-RPC 2.0 request structure.
///
/// # Example
///
/// ```
/// use flowsnap_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("eth_blockNumber", None, json!(1));
///
/// assert_eq!(request.method, "eth_blockNumber");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with zero allocation for the version string.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }
}

/// JSON-RPC 2.0 response structure.
///
/// A response contains either a `result` (success) or an `error` (failure), but never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    pub id: Arc<serde_json::Value>,
}

/// JSON-RPC 2.0 error object.
///
/// - `-32700`: Parse error (invalid JSON)
/// - `-32600`: Invalid request (malformed JSON-RPC)
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000` to `-32099`: Server-defined errors (implementation-specific)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
