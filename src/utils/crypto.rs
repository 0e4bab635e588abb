//! Hashing helpers shared by address derivation, transaction hashing
//! and display formatting.

use tiny_keccak::{Hasher, Keccak};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// EIP-55 rendering: a hex letter is uppercased when the matching nibble
/// of `keccak256(lowercase_hex)` is 8 or more.
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let body: String = lower
        .char_indices()
        .map(|(i, ch)| {
            let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if nibble >= 8 {
                ch.to_ascii_uppercase()
            } else {
                ch
            }
        })
        .collect();

    format!("0x{}", body)
}
