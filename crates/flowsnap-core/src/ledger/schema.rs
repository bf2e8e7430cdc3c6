//! Wire schema of the ledger's GraphQL responses.
//!
//! The ledger encodes every integer as a string. Raw structs mirror the wire shape
//! exactly; [`TryFrom`] turns one [`RawAccountTokenSnapshot`] into a validated
//! [`LedgerRecord`] or a [`LedgerError::InvalidRecord`] naming the offending field.

use alloy_primitives::{Address, I256};
use serde::Deserialize;
use std::str::FromStr;

use super::LedgerError;
use crate::{
    types::{LedgerRecord, PoolMembership},
    utils::parse_decimal_i256,
};

/// Paginated holder query. `$cursor` is the last id seen, `""` for the first page.
pub const ACCOUNT_TOKEN_SNAPSHOTS_QUERY: &str = r"query AccountTokenSnapshots($token: String!, $cursor: String!, $first: Int!) {
  accountTokenSnapshots(
    first: $first
    where: { token: $token, id_gt: $cursor }
    orderBy: id
    orderDirection: asc
  ) {
    id
    account {
      id
      poolMemberships(where: { pool_: { token: $token } }) {
        id
        units
        isConnected
        pool {
          id
          perUnitFlowRate
        }
      }
    }
    totalNetFlowRate
    balanceUntilUpdatedAt
    updatedAtTimestamp
    updatedAtBlockNumber
  }
}";

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTokenSnapshotsData {
    pub account_token_snapshots: Vec<RawAccountTokenSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccountTokenSnapshot {
    pub id: String,
    pub account: RawAccount,
    pub total_net_flow_rate: String,
    pub balance_until_updated_at: String,
    pub updated_at_timestamp: String,
    pub updated_at_block_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccount {
    pub id: String,
    #[serde(default)]
    pub pool_memberships: Vec<RawPoolMembership>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoolMembership {
    pub id: String,
    pub units: String,
    pub is_connected: bool,
    pub pool: RawPool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPool {
    pub id: String,
    pub per_unit_flow_rate: String,
}

fn invalid(id: &str, field: &'static str, reason: impl ToString) -> LedgerError {
    LedgerError::InvalidRecord { id: id.to_string(), field, reason: reason.to_string() }
}

fn address(id: &str, field: &'static str, raw: &str) -> Result<Address, LedgerError> {
    Address::from_str(raw).map_err(|e| invalid(id, field, e))
}

fn integer(id: &str, field: &'static str, raw: &str) -> Result<I256, LedgerError> {
    parse_decimal_i256(raw).map_err(|e| invalid(id, field, e))
}

fn unsigned(id: &str, field: &'static str, raw: &str) -> Result<u64, LedgerError> {
    raw.parse::<u64>().map_err(|e| invalid(id, field, e))
}

impl TryFrom<RawAccountTokenSnapshot> for LedgerRecord {
    type Error = LedgerError;

    fn try_from(raw: RawAccountTokenSnapshot) -> Result<Self, Self::Error> {
        let id = raw.id.as_str();

        let pool_memberships = raw
            .account
            .pool_memberships
            .iter()
            .map(|m| {
                let units_held = integer(id, "poolMemberships.units", &m.units)?;
                if units_held.is_negative() {
                    return Err(invalid(id, "poolMemberships.units", "negative units"));
                }
                Ok(PoolMembership {
                    pool: address(id, "poolMemberships.pool.id", &m.pool.id)?,
                    per_unit_flow_rate: integer(
                        id,
                        "poolMemberships.pool.perUnitFlowRate",
                        &m.pool.per_unit_flow_rate,
                    )?,
                    units_held,
                    connected: m.is_connected,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            account: address(id, "account.id", &raw.account.id)?,
            ledger_balance: integer(id, "balanceUntilUpdatedAt", &raw.balance_until_updated_at)?,
            net_flow_rate: integer(id, "totalNetFlowRate", &raw.total_net_flow_rate)?,
            last_update_timestamp: unsigned(id, "updatedAtTimestamp", &raw.updated_at_timestamp)?,
            last_update_block: unsigned(id, "updatedAtBlockNumber", &raw.updated_at_block_number)?,
            pool_memberships,
            id: raw.id,
        })
    }
}
