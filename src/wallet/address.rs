//! Address Derivation
//!
//! Account address = last 20 bytes of keccak256 over the 64-byte
//! uncompressed point (without the `0x04` marker).

use crate::error::{SignerError, SignerResult};
use crate::types::{ChainAddress, PublicKey};
use crate::utils::keccak256;

/// Derive the account address for an uncompressed secp256k1 key.
///
/// A 65-byte key has its leading format byte dropped. What remains must be
/// exactly 64 bytes and a point on the curve.
pub fn derive_address(key: &PublicKey) -> SignerResult<ChainAddress> {
    let point = validated_point(key)?;
    let hash = keccak256(point);
    ChainAddress::from_slice(&hash[12..])
}

/// Strip the format byte and check the point lies on secp256k1
fn validated_point(key: &PublicKey) -> SignerResult<&[u8]> {
    let bytes = key.as_bytes();
    let point = if bytes.len() == 65 { &bytes[1..] } else { bytes };

    if point.len() != 64 {
        return Err(SignerError::invalid_public_key(format!(
            "Expected 64 key bytes after prefix removal, got {}",
            point.len()
        )));
    }

    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(point);
    secp256k1::PublicKey::from_slice(&uncompressed).map_err(|e| {
        SignerError::invalid_public_key("Key bytes are not a secp256k1 point")
            .with_details(e.to_string())
    })?;

    Ok(point)
}
