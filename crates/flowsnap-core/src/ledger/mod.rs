//! Streaming ledger access.
//!
//! - [`LedgerSource`]: one page of records after a cursor
//! - [`SubgraphClient`]: GraphQL implementation over the shared [`HttpClient`](crate::rpc::HttpClient)
//! - [`LedgerPager`]: drains a source page by page for one token
//! - [`schema`]: raw wire types and their validation into [`LedgerRecord`](crate::types::LedgerRecord)

pub mod client;
pub mod pager;
pub mod schema;

use thiserror::Error;

use crate::rpc::RpcError;

pub use client::{LedgerSource, SubgraphClient};
pub use pager::{LedgerPager, DEFAULT_PAGE_SIZE};

/// Errors raised while reading the ledger. Any of them aborts the current run.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(#[from] RpcError),

    /// The GraphQL response carried an `errors` list.
    #[error("ledger query failed: {0}")]
    GraphQl(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("ledger response has neither data nor errors")]
    MissingData,

    #[error("invalid ledger record {id}: {field}: {reason}")]
    InvalidRecord { id: String, field: &'static str, reason: String },

    #[error("ledger page did not advance past cursor {cursor}")]
    CursorStalled { cursor: String },
}
