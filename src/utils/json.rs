//! JSON and Hex Quantity Utilities
//!
//! JSON-RPC and the custody API both exchange integers as `0x`-prefixed
//! hex quantities; these helpers convert without panicking.

use crate::error::{SignerError, SignerResult};
use ethers_core::types::U256;

/// Strip an optional `0x`/`0X` prefix
pub fn strip_hex_prefix(hex_str: &str) -> &str {
    hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str)
}

/// Parse hex string to u64 safely
pub fn parse_hex_u64(hex_str: &str) -> SignerResult<u64> {
    u64::from_str_radix(strip_hex_prefix(hex_str), 16)
        .map_err(|e| SignerError::parse_error(format!("Invalid hex u64 '{}': {}", hex_str, e)))
}

/// Parse hex quantity to U256 safely
pub fn parse_hex_u256(hex_str: &str) -> SignerResult<U256> {
    let cleaned = strip_hex_prefix(hex_str);
    if cleaned.is_empty() || cleaned.len() > 64 {
        return Err(SignerError::parse_error(format!(
            "Invalid hex quantity '{}'",
            hex_str
        )));
    }
    U256::from_str_radix(cleaned, 16)
        .map_err(|e| SignerError::parse_error(format!("Invalid hex quantity '{}': {}", hex_str, e)))
}

/// Render an integer as a minimal `0x`-prefixed hex quantity
pub fn to_hex_quantity(value: U256) -> String {
    format!("{:#x}", value)
}
