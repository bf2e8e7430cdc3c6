//! On-chain reads used by the verifier.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{HttpClient, RpcError};
use crate::{
    types::{JsonRpcRequest, JsonRpcResponse},
    utils::{parse_hex_u256, parse_hex_u64},
};

/// Selector of `balanceOf(address)`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Read-only access to one chain.
///
/// Implementations perform a single attempt per call; retries are applied by the
/// caller.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head height.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// `token.balanceOf(account)` evaluated at exactly `block`.
    async fn balance_of(&self, token: Address, account: Address, block: u64)
        -> Result<U256, RpcError>;
}

/// ABI-encodes `balanceOf(account)` calldata as a 0x-prefixed hex string.
#[must_use]
pub fn balance_of_calldata(account: Address) -> String {
    let mut data = [0u8; 36];
    data[..4].copy_from_slice(&BALANCE_OF_SELECTOR);
    data[16..].copy_from_slice(account.as_slice());
    format!("0x{}", hex::encode(data))
}

/// [`ChainClient`] over Ethereum JSON-RPC (`eth_blockNumber`, `eth_call`).
pub struct JsonRpcChainClient {
    url: String,
    http_client: Arc<HttpClient>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    #[must_use]
    pub fn new(url: impl Into<String>, http_client: Arc<HttpClient>, timeout: Duration) -> Self {
        Self { url: url.into(), http_client, timeout, next_id: AtomicU64::new(1) }
    }

    /// Sends one JSON-RPC request and returns its `result`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidRequest` if request serialization fails,
    /// `RpcError::InvalidResponse` if the body is not a JSON-RPC response, and
    /// `RpcError::RpcError` if the node returned an error object.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, Some(params), json!(id));

        let body = serde_json::to_vec(&request).map_err(|e| {
            RpcError::InvalidRequest(format!("Failed to serialize request: {e}"))
        })?;

        let response_bytes =
            self.http_client.post_json(&self.url, bytes::Bytes::from(body), self.timeout).await?;

        let response: JsonRpcResponse = serde_json::from_slice(&response_bytes)
            .map_err(|e| RpcError::InvalidResponse(format!("Invalid JSON: {e}")))?;

        if let Some(error) = response.error {
            return Err(RpcError::RpcError(error.code, error.message));
        }

        response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_blockNumber: expected string".into()))?;
        parse_hex_u64(hex).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn balance_of(
        &self,
        token: Address,
        account: Address,
        block: u64,
    ) -> Result<U256, RpcError> {
        let params = json!([
            { "to": token, "data": balance_of_calldata(account) },
            format!("0x{block:x}"),
        ]);
        let result = self.call("eth_call", params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_call: expected string".into()))?;

        // A 32-byte word, "0x" for non-contract targets, or garbage from a proxy.
        let digits = hex.strip_prefix("0x").unwrap_or(hex);
        if digits.len() > 64 {
            return Err(RpcError::InvalidResponse(format!(
                "eth_call: balanceOf returned {} bytes",
                digits.len() / 2
            )));
        }
        parse_hex_u256(hex).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}
