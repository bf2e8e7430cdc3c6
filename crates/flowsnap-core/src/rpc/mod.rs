//! On-chain access: HTTP transport, JSON-RPC chain client, retry policy and the
//! pinned-block balance verifier.
//!
//! ```text
//! RpcBalanceVerifier ──► RetryPolicy ──► dyn ChainClient ──► HttpClient (shared)
//!        │                                     │
//!   in-flight semaphore                 JsonRpcChainClient
//!   (process-wide)                  eth_blockNumber / eth_call
//! ```

pub mod client;
pub mod errors;
pub mod http_client;
pub mod retry;
pub mod verifier;

pub use client::{balance_of_calldata, ChainClient, JsonRpcChainClient, BALANCE_OF_SELECTOR};
pub use errors::{RpcError, RpcErrorCategory};
pub use http_client::{HttpClient, HttpClientConfig};
pub use retry::{Retried, RetryPolicy};
pub use verifier::{BatchStats, RpcBalanceVerifier, Verification, VerifierConfig, VerifierError};
