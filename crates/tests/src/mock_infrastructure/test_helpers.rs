//! Test data builders for ledger records.

use alloy_primitives::Address;
use serde_json::{json, Value};

/// `updatedAtTimestamp` of every record built by [`ledger_record`].
pub const LEDGER_TIMESTAMP: u64 = 1_700_000_000;

/// Deterministic, strictly increasing account addresses for bulk fixtures.
#[must_use]
pub fn numbered_address(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::from(bytes)
}

/// Lowercase `0x`-prefixed hex, the form the ledger stores ids in.
#[must_use]
pub fn lower(address: Address) -> String {
    address.to_string().to_lowercase()
}

/// Ledger id of an account's record for a token.
#[must_use]
pub fn record_id(account: Address, token: Address) -> String {
    format!("{}-{}", lower(account), lower(token))
}

/// A raw `accountTokenSnapshot` as the ledger returns it.
#[must_use]
pub fn ledger_record(
    account: Address,
    token: Address,
    balance: &str,
    net_flow_rate: &str,
    updated_at_block: u64,
) -> Value {
    json!({
        "id": record_id(account, token),
        "account": {
            "id": lower(account),
            "poolMemberships": []
        },
        "totalNetFlowRate": net_flow_rate,
        "balanceUntilUpdatedAt": balance,
        "updatedAtTimestamp": LEDGER_TIMESTAMP.to_string(),
        "updatedAtBlockNumber": updated_at_block.to_string()
    })
}

/// Adds a pool membership to a record built by [`ledger_record`].
#[must_use]
pub fn with_pool_membership(
    mut record: Value,
    pool: Address,
    units: &str,
    per_unit_flow_rate: &str,
    connected: bool,
) -> Value {
    let membership = json!({
        "id": format!("{}-{}", lower(pool), record["account"]["id"].as_str().unwrap_or_default()),
        "units": units,
        "isConnected": connected,
        "pool": { "id": lower(pool), "perUnitFlowRate": per_unit_flow_rate }
    });
    if let Some(memberships) = record["account"]["poolMemberships"].as_array_mut() {
        memberships.push(membership);
    }
    record
}
