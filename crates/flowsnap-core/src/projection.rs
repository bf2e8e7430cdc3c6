//! Balance projection from the ledger's last update to a reference time.
//!
//! The ledger stores the balance as of its last update together with the rates at
//! which the balance has been moving since. Projection is the closed form of that
//! accrual:
//!
//! ```text
//! Δt        = max(0, reference_timestamp - last_update_timestamp)
//! balance   = ledger_balance + net_flow_rate · Δt + Σ connected (per_unit_flow_rate · units · Δt)
//! claimable =                                      Σ disconnected (per_unit_flow_rate · units · Δt)
//! ```
//!
//! [`project`] is pure and performs checked 256-bit arithmetic.

use alloy_primitives::I256;
use thiserror::Error;

use crate::types::LedgerRecord;

/// Errors that can occur while projecting a ledger record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// An accrual term does not fit the 256-bit signed domain.
    #[error("projection overflow in {0}")]
    Overflow(&'static str),
}

/// Projected balances of one account at a reference timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    /// Spendable balance: ledger balance plus flow and connected-pool accrual.
    pub balance: I256,
    /// Accrual from disconnected pools the account has not pulled yet.
    pub claimable: I256,
    /// Seconds of accrual applied after clamping.
    pub elapsed_seconds: u64,
    /// Set when the ledger's timestamp was ahead of the reference time.
    pub clamped: bool,
}

/// Projects `record` to `reference_timestamp` (unix seconds).
///
/// A ledger timestamp later than the reference (clock or indexing skew) applies no
/// accrual instead of subtracting from the balance; [`Projection::clamped`] reports
/// that case.
///
/// # Errors
///
/// Returns [`ProjectionError::Overflow`] if any product or sum leaves the `I256` range.
pub fn project(record: &LedgerRecord, reference_timestamp: u64) -> Result<Projection, ProjectionError> {
    let clamped = reference_timestamp < record.last_update_timestamp;
    let elapsed_seconds = reference_timestamp.saturating_sub(record.last_update_timestamp);
    let delta_t = I256::try_from(elapsed_seconds).map_err(|_| ProjectionError::Overflow("delta_t"))?;

    let mut balance = record.ledger_balance;
    let mut claimable = I256::ZERO;

    if elapsed_seconds > 0 {
        let flow_accrual = accrue(record.net_flow_rate, delta_t, "net_flow_rate")?;
        balance = balance.checked_add(flow_accrual).ok_or(ProjectionError::Overflow("balance"))?;

        for membership in &record.pool_memberships {
            let per_second = membership
                .per_unit_flow_rate
                .checked_mul(membership.units_held)
                .ok_or(ProjectionError::Overflow("pool_flow_rate"))?;
            let accrual = accrue(per_second, delta_t, "pool_accrual")?;

            if membership.connected {
                balance =
                    balance.checked_add(accrual).ok_or(ProjectionError::Overflow("balance"))?;
            } else {
                claimable =
                    claimable.checked_add(accrual).ok_or(ProjectionError::Overflow("claimable"))?;
            }
        }
    }

    Ok(Projection { balance, claimable, elapsed_seconds, clamped })
}

/// `rate · Δt`, with a zero rate short-circuiting to "no accrual".
#[inline]
fn accrue(rate: I256, delta_t: I256, term: &'static str) -> Result<I256, ProjectionError> {
    if rate.is_zero() {
        return Ok(I256::ZERO);
    }
    rate.checked_mul(delta_t).ok_or(ProjectionError::Overflow(term))
}
