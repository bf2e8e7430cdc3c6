//! Integer quantity parsing and formatting.
//!
//! Monetary values never pass through floating point. JSON-RPC returns hex words,
//! the ledger returns base-10 strings, and everything we serve or persist is a
//! base-10 string.

use alloy_primitives::{I256, U256};
use thiserror::Error;

/// Error types for quantity parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid hex quantity: {0}")]
    InvalidHex(String),
    #[error("invalid decimal integer: {0}")]
    InvalidDecimal(String),
}

/// Parse a hex quantity (with or without 0x prefix) into a `u64`.
///
/// # Examples
/// ```
/// use flowsnap_core::utils::parse_hex_u64;
///
/// assert_eq!(parse_hex_u64("0xff"), Ok(255));
/// assert_eq!(parse_hex_u64("ff"), Ok(255));
/// assert!(parse_hex_u64("0x").is_err());
/// ```
///
/// # Errors
/// Returns [`QuantityError::InvalidHex`] for empty or non-hex input.
pub fn parse_hex_u64(s: &str) -> Result<u64, QuantityError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err(QuantityError::InvalidHex(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidHex(s.to_string()))
}

/// Parse a hex word (as returned by `eth_call`) into a `U256`.
///
/// `"0x"` is accepted as zero: some nodes return an empty result for accounts
/// that were never touched by a token without a fallback.
///
/// # Errors
/// Returns [`QuantityError::InvalidHex`] for non-hex input or more than 32 bytes.
pub fn parse_hex_u256(s: &str) -> Result<U256, QuantityError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidHex(s.to_string()))
}

/// Parse a signed base-10 integer into an `I256`.
///
/// # Errors
/// Returns [`QuantityError::InvalidDecimal`] for empty, non-numeric or
/// out-of-range input.
pub fn parse_decimal_i256(s: &str) -> Result<I256, QuantityError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::InvalidDecimal(s.to_string()));
    }
    I256::from_dec_str(trimmed).map_err(|_| QuantityError::InvalidDecimal(s.to_string()))
}

/// `serde` adapter serializing an `I256` as a base-10 string.
pub mod decimal {
    use alloy_primitives::I256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_decimal_i256(&raw).map_err(serde::de::Error::custom)
    }
}

/// `serde` adapter for an optional `I256` serialized as a base-10 string.
pub mod decimal_opt {
    use alloy_primitives::I256;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<I256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<I256>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| super::parse_decimal_i256(&s).map_err(serde::de::Error::custom)).transpose()
    }
}
