//! RPC Mock Builder for Ethereum JSON-RPC Testing
//!
//! Wraps mockito to answer `eth_blockNumber` and `balanceOf` `eth_call`s.

use alloy_primitives::{Address, B256, U256};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

use super::test_helpers::lower;

/// Builder for creating mock Ethereum RPC responses.
pub struct RpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl RpcMockBuilder {
    /// Creates a new RPC mock builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    fn balance_of_matcher(token: Address, account: Address, block: u64) -> Matcher {
        let account_word = format!("{:0>64}", lower(account).trim_start_matches("0x"));
        Matcher::AllOf(vec![
            Matcher::Regex(r#""method"\s*:\s*"eth_call""#.to_string()),
            Matcher::Regex(format!(r#"(?i)"to"\s*:\s*"{}""#, lower(token))),
            Matcher::Regex(format!(
                r#""data"\s*:\s*"0x70a08231{account_word}".*"0x{block:x}""#
            )),
        ])
    }

    /// Mocks an `eth_blockNumber` request.
    pub fn mock_block_number(&mut self, block_number: u64) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""method"\s*:\s*"eth_blockNumber""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": format!("0x{:x}", block_number)
                })
                .to_string(),
            )
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks `balanceOf(account)` on `token` pinned at `block`.
    pub fn mock_balance_of(
        &mut self,
        token: Address,
        account: Address,
        block: u64,
        balance: U256,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Self::balance_of_matcher(token, account, block))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": B256::from(balance).to_string()
                })
                .to_string(),
            )
            .create();

        self.mocks.push(mock);
        self
    }

    /// Makes `balanceOf(account)` fail with a 500 on every attempt.
    pub fn mock_balance_of_unavailable(
        &mut self,
        token: Address,
        account: Address,
        block: u64,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Self::balance_of_matcher(token, account, block))
            .with_status(500)
            .with_body("Internal Server Error")
            .expect_at_least(1)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an RPC error response.
    pub fn mock_rpc_error(&mut self, method: &str, code: i32, message: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {
                        "code": code,
                        "message": message
                    }
                })
                .to_string(),
            )
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks a server error (500) for every request.
    pub fn mock_server_error(&mut self) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(500)
            .with_body("Internal Server Error")
            .create();

        self.mocks.push(mock);
        self
    }

    /// Verifies all mocks were called.
    #[must_use]
    pub fn verify_all_called(&self) -> bool {
        self.mocks.iter().all(Mock::matched)
    }

    /// Gets the number of mocks that were called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.mocks.iter().filter(|m| m.matched()).count()
    }
}
