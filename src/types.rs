//! Shared types for the quorum signer
//!
//! All records that travel along the signing pipeline are defined here
//! for consistent serialization between stages and across resumptions.

use crate::error::{SignerError, SignerResult};
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Network Constants
// =============================================================================

/// SLIP-44 coin type used when asking the custody service for a key.
pub const ETH_COIN_ID: u32 = 60;

/// Ropsten, the network the custody demo targets by default.
pub const DEFAULT_CHAIN_ID: u64 = 3;

// =============================================================================
// Addresses and Keys
// =============================================================================

/// A 20-byte account address.
///
/// Rendered as `0x`-prefixed lowercase hex; parsing accepts either case
/// and an optional prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainAddress([u8; 20]);

impl ChainAddress {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SignerResult<Self> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            SignerError::invalid_address(format!(
                "Address must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex with `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case rendering for display
    pub fn to_checksum(&self) -> String {
        crate::utils::to_checksum_address(&self.0)
    }
}

impl FromStr for ChainAddress {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if body.len() != Self::LEN * 2 {
            return Err(SignerError::invalid_address(format!(
                "Expected 40 hex characters, got {}",
                body.len()
            ))
            .with_details(trimmed.to_string()));
        }

        let bytes = hex::decode(body).map_err(|e| {
            SignerError::invalid_address(format!("Address is not hex: {}", e))
                .with_details(trimmed.to_string())
        })?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainAddress({})", self.to_hex())
    }
}

impl Serialize for ChainAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Address> for ChainAddress {
    fn from(address: Address) -> Self {
        Self(address.0)
    }
}

impl From<ChainAddress> for Address {
    fn from(address: ChainAddress) -> Self {
        Address::from(address.0)
    }
}

/// Raw uncompressed EC point as returned inside the custody service's DER key.
///
/// 65 bytes when the `0x04` format prefix is present, 64 without it. Curve
/// validity is checked at derivation time, not construction.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// Address generated through the custody service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub address: ChainAddress,
    /// DER hex exactly as returned by the custody service
    #[serde(rename = "publicKeyDER")]
    pub public_key_der: String,
    /// Hex of the raw point bytes extracted from the DER structure
    pub public_key_raw: String,
}

// =============================================================================
// Transactions
// =============================================================================

/// Legacy (EIP-155) transfer awaiting a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub from: ChainAddress,
    pub to: ChainAddress,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub chain_id: u64,
}

/// Canonical hex rendering of a transaction's fields.
///
/// This is the shape shown to quorum approvers in the sign request details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxData {
    pub from: String,
    pub to: String,
    pub nonce: u64,
    pub value: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub chain_id: String,
}

/// Unsigned transaction plus the digest the quorum has to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub transaction: UnsignedTransaction,
    #[serde(with = "crate::serde_bytes::hex32")]
    pub hash_to_sign: [u8; 32],
}

impl PendingTransaction {
    /// Digest as bare lowercase hex, the form the custody API expects
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash_to_sign)
    }
}

/// Request submitted to the custody quorum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(with = "crate::serde_bytes::hex32")]
    pub hash_to_sign: [u8; 32],
    #[serde(rename = "publicKeyDER")]
    pub public_key_der: String,
    pub description: String,
    pub details: String,
}

/// Status of a remote quorum operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Completed,
    /// Terminal failure reported by the service (rejected, expired, ...)
    Failed(String),
    /// Any other status; treated as still in progress
    Other(String),
}

impl OperationStatus {
    const FAILURE_STATUSES: &'static [&'static str] = &[
        "REJECTED", "DECLINED", "FAILED", "ERROR", "CANCELLED", "CANCELED", "EXPIRED",
    ];

    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "PENDING" => Self::Pending,
            "COMPLETED" => Self::Completed,
            s if Self::FAILURE_STATUSES.contains(&s) => Self::Failed(upper),
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed(s) | Self::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Quorum signing operation as reported by the custody service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOperation {
    pub status: OperationStatus,
    /// Raw `r || s` signatures in hex, one per requested hash
    #[serde(default, deserialize_with = "crate::serde_bytes::null_as_default")]
    pub signatures: Vec<String>,
    /// Recovery values, one per signature
    #[serde(default, deserialize_with = "crate::serde_bytes::null_as_default")]
    pub v: Vec<i64>,
}

impl SignOperation {
    pub fn is_completed(&self) -> bool {
        self.status == OperationStatus::Completed
    }
}

/// Fully signed transaction, verified against its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    #[serde(with = "crate::serde_bytes::hex32")]
    pub r: [u8; 32],
    #[serde(with = "crate::serde_bytes::hex32")]
    pub s: [u8; 32],
    /// EIP-155 recovery field: `chain_id * 2 + recovery + 35`
    pub v: u64,
    /// Canonical serialized bytes ready for broadcast
    #[serde(with = "crate::serde_bytes::hex_vec")]
    pub raw: Vec<u8>,
    /// Keccak-256 of `raw`
    #[serde(with = "crate::serde_bytes::hex32")]
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    #[test]
    fn test_address_parse_and_render() {
        let addr: ChainAddress = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        assert_eq!(addr.to_string(), ADDR);
        assert_eq!(addr.to_checksum(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");

        let bare: ChainAddress = ADDR.trim_start_matches("0x").parse().unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("0x1234".parse::<ChainAddress>().is_err());
        assert!("zz".repeat(20).parse::<ChainAddress>().is_err());
        assert!(ChainAddress::from_slice(&[0u8; 19]).is_err());
    }

    #[test]
    fn test_address_serde_uses_lowercase_hex() {
        let addr: ChainAddress = ADDR.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", ADDR));
        let back: ChainAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_operation_status_parse() {
        assert_eq!(OperationStatus::parse("PENDING"), OperationStatus::Pending);
        assert_eq!(OperationStatus::parse("completed"), OperationStatus::Completed);
        assert_eq!(
            OperationStatus::parse("Rejected"),
            OperationStatus::Failed("REJECTED".to_string())
        );
        assert_eq!(
            OperationStatus::parse("IN_PROGRESS"),
            OperationStatus::Other("IN_PROGRESS".to_string())
        );
        assert!(!OperationStatus::parse("IN_PROGRESS").is_terminal());
        assert!(OperationStatus::parse("EXPIRED").is_terminal());
    }

    #[test]
    fn test_sign_operation_pending_with_nulls() {
        let op: SignOperation =
            serde_json::from_str(r#"{"status":"PENDING","signatures":null,"v":null}"#).unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert!(op.signatures.is_empty());
        assert!(op.v.is_empty());
        assert!(!op.is_completed());
    }

    #[test]
    fn test_sign_operation_completed() {
        let json = format!(
            r#"{{"status":"COMPLETED","signatures":["{}"],"v":[27],"operationID":"op-1"}}"#,
            "ab".repeat(64)
        );
        let op: SignOperation = serde_json::from_str(&json).unwrap();
        assert!(op.is_completed());
        assert_eq!(op.signatures.len(), 1);
        assert_eq!(op.v, vec![27]);
    }
}
