//! Parsing helpers shared by the ledger and RPC boundaries.
//!
//! ## Quantities (`quantity`)
//! - Hex quantities from JSON-RPC (`"0x1b4"`) into `u64` and `U256`
//! - Decimal integers from the ledger (`"-1500"`) into `I256`
//! - `serde` adapters that keep monetary values as decimal strings on the wire

pub mod quantity;

pub use quantity::{parse_decimal_i256, parse_hex_u256, parse_hex_u64, QuantityError};
