//! Mock ledger and JSON-RPC servers.
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{LedgerMockBuilder, RpcMockBuilder, ledger_record};
//!
//! let mut ledger = LedgerMockBuilder::new().await;
//! ledger.mock_page(token, "", &[ledger_record(account, token, "100", "0", 10)]);
//!
//! let mut rpc = RpcMockBuilder::new().await;
//! rpc.mock_block_number(100);
//! ```

pub mod ledger_mock;
pub mod rpc_mock;
pub mod test_helpers;

pub use ledger_mock::LedgerMockBuilder;
pub use rpc_mock::RpcMockBuilder;
pub use test_helpers::*;
