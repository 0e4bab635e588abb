//! DER Public Key Codec
//!
//! The custody service hands out keys as hex-encoded X.509
//! SubjectPublicKeyInfo structures:
//!
//! ```text
//! 30 len                      SEQUENCE
//!    30 len ...               AlgorithmIdentifier (skipped)
//!    03 len 00 <key bytes>    BIT STRING, no unused bits
//! ```
//!
//! Only the walk needed to reach the BIT STRING is implemented.

use thiserror::Error;

use crate::error::{SignerError, SignerResult};
use crate::types::PublicKey;
use crate::utils::strip_hex_prefix;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;

/// SubjectPublicKeyInfo header for an uncompressed secp256k1 key
/// (id-ecPublicKey, secp256k1, BIT STRING of 66 bytes).
const SECP256K1_SPKI_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

/// Structural DER failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("input ends early at offset {0}")]
    Truncated(usize),

    #[error("unsupported length encoding 0x{byte:02x} at offset {offset}")]
    UnsupportedLength { offset: usize, byte: u8 },

    #[error("expected tag 0x{expected:02x} at offset {offset}, found 0x{found:02x}")]
    UnexpectedTag { offset: usize, expected: u8, found: u8 },

    #[error("public key info has no {0} element")]
    MissingElement(&'static str),

    #[error("bit string is empty")]
    EmptyBitString,

    #[error("bit string declares {0} unused bits")]
    UnusedBits(u8),

    #[error("{0} trailing bytes after public key info")]
    TrailingBytes(usize),
}

impl From<DerError> for SignerError {
    fn from(e: DerError) -> Self {
        SignerError::malformed_key(format!("Malformed DER public key: {}", e))
    }
}

/// One tag-length-value element
struct Tlv<'a> {
    offset: usize,
    tag: u8,
    content: &'a [u8],
}

/// Cursor over a DER byte slice. `base` is the absolute offset of `data`
/// within the full input, kept for error messages.
struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8, DerError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DerError::Truncated(self.base + self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_length(&mut self) -> Result<usize, DerError> {
        let offset = self.base + self.pos;
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }

        // Long form: low bits give the number of length octets. 0x80 is the
        // indefinite form, which DER forbids.
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 {
            return Err(DerError::UnsupportedLength { offset, byte: first });
        }

        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.read_byte()? as usize;
        }
        Ok(len)
    }

    fn read_tlv(&mut self) -> Result<Tlv<'a>, DerError> {
        let offset = self.base + self.pos;
        let tag = self.read_byte()?;
        let len = self.read_length()?;

        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DerError::Truncated(self.base + self.data.len()))?;
        self.pos = end;

        Ok(Tlv {
            offset,
            tag,
            content: &self.data[start..end],
        })
    }
}

fn expect_tag(tlv: &Tlv<'_>, expected: u8) -> Result<(), DerError> {
    if tlv.tag != expected {
        return Err(DerError::UnexpectedTag {
            offset: tlv.offset,
            expected,
            found: tlv.tag,
        });
    }
    Ok(())
}

/// Extract the key bytes from DER SubjectPublicKeyInfo bytes
pub fn decode_der(der: &[u8]) -> Result<PublicKey, DerError> {
    let mut outer = DerReader::new(der, 0);
    let spki = outer.read_tlv()?;
    expect_tag(&spki, TAG_SEQUENCE)?;

    if outer.remaining() > 0 {
        return Err(DerError::TrailingBytes(outer.remaining()));
    }

    // The sequence content starts after the tag and length octets
    let content_base = der.len() - spki.content.len();
    let mut inner = DerReader::new(spki.content, content_base);

    if inner.remaining() == 0 {
        return Err(DerError::MissingElement("algorithm"));
    }
    inner.read_tlv()?;

    if inner.remaining() == 0 {
        return Err(DerError::MissingElement("subject public key"));
    }
    let bit_string = inner.read_tlv()?;
    expect_tag(&bit_string, TAG_BIT_STRING)?;

    let (&unused_bits, key) = bit_string
        .content
        .split_first()
        .ok_or(DerError::EmptyBitString)?;
    if unused_bits != 0 {
        return Err(DerError::UnusedBits(unused_bits));
    }

    Ok(PublicKey::from_bytes(key.to_vec()))
}

/// Decode a hex DER public key (optional `0x` prefix) into raw key bytes.
///
/// The key is returned as stored in the BIT STRING, normally 65 bytes
/// starting with the `0x04` uncompressed marker. Curve validity is checked
/// by address derivation.
pub fn decode(der_hex: &str) -> SignerResult<PublicKey> {
    let cleaned = strip_hex_prefix(der_hex.trim());
    let der = hex::decode(cleaned).map_err(|e| DerError::Hex(e.to_string()))?;
    Ok(decode_der(&der)?)
}

/// Encode an uncompressed secp256k1 key as hex SubjectPublicKeyInfo.
///
/// Accepts the 65-byte `0x04`-prefixed form or the bare 64-byte point.
pub fn encode(key: &PublicKey) -> SignerResult<String> {
    let bytes = key.as_bytes();
    let point = match bytes.len() {
        65 if bytes[0] == 0x04 => &bytes[1..],
        64 => bytes,
        n => {
            return Err(SignerError::invalid_public_key(format!(
                "Expected an uncompressed 65-byte key, got {} bytes",
                n
            )))
        }
    };

    let mut der = Vec::with_capacity(SECP256K1_SPKI_PREFIX.len() + 65);
    der.extend_from_slice(&SECP256K1_SPKI_PREFIX);
    der.push(0x04);
    der.extend_from_slice(point);
    Ok(hex::encode(der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    // Generator point, the public key of private key 1
    const G_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
                                  483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn g_der_hex() -> String {
        format!("{}{}", hex::encode(SECP256K1_SPKI_PREFIX), G_UNCOMPRESSED)
    }

    #[test]
    fn test_decode_spki() {
        let key = decode(&g_der_hex()).unwrap();
        assert_eq!(key.len(), 65);
        assert_eq!(key.to_hex(), G_UNCOMPRESSED);
    }

    #[test]
    fn test_decode_accepts_prefix_and_uppercase() {
        let upper = format!("0x{}", g_der_hex().to_uppercase());
        assert_eq!(decode(&upper).unwrap().to_hex(), G_UNCOMPRESSED);
    }

    #[test]
    fn test_decode_long_form_lengths() {
        // Same structure with the outer and bit string lengths in long form
        let der = format!(
            "308157301006072a8648ce3d020106052b8104000a03814200{}",
            G_UNCOMPRESSED
        );
        assert_eq!(decode(&der).unwrap().to_hex(), G_UNCOMPRESSED);
    }

    #[test]
    fn test_encode_round_trip() {
        let key = decode(&g_der_hex()).unwrap();
        assert_eq!(encode(&key).unwrap(), g_der_hex());

        let bare = PublicKey::from_bytes(key.as_bytes()[1..].to_vec());
        assert_eq!(encode(&bare).unwrap(), g_der_hex());

        assert!(encode(&PublicKey::from_bytes(vec![0x04; 33])).is_err());
    }

    #[test]
    fn test_rejects_bad_hex() {
        let err = decode("30zz").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedKeyEncoding);
    }

    #[test]
    fn test_rejects_truncated_input() {
        let der = g_der_hex();
        let err = decode(&der[..der.len() - 2]).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedKeyEncoding);

        assert!(matches!(decode_der(&[]), Err(DerError::Truncated(0))));
        assert!(matches!(decode_der(&[0x30]), Err(DerError::Truncated(1))));
    }

    #[test]
    fn test_rejects_non_sequence() {
        let der = format!("31{}", &g_der_hex()[2..]);
        let raw = hex::decode(der).unwrap();
        assert!(matches!(
            decode_der(&raw),
            Err(DerError::UnexpectedTag { offset: 0, expected: 0x30, found: 0x31 })
        ));
    }

    #[test]
    fn test_rejects_missing_bit_string() {
        // SEQUENCE holding only the algorithm identifier
        let raw = hex::decode("3012301006072a8648ce3d020106052b8104000a").unwrap();
        assert_eq!(
            decode_der(&raw).unwrap_err(),
            DerError::MissingElement("subject public key")
        );

        assert_eq!(
            decode_der(&[0x30, 0x00]).unwrap_err(),
            DerError::MissingElement("algorithm")
        );
    }

    #[test]
    fn test_rejects_wrong_second_tag() {
        let der = g_der_hex().replacen("034200", "044200", 1);
        let raw = hex::decode(der).unwrap();
        assert!(matches!(
            decode_der(&raw),
            Err(DerError::UnexpectedTag { offset: 20, expected: 0x03, found: 0x04 })
        ));
    }

    #[test]
    fn test_rejects_unused_bits() {
        let der = g_der_hex().replacen("034200", "034201", 1);
        let raw = hex::decode(der).unwrap();
        assert_eq!(decode_der(&raw).unwrap_err(), DerError::UnusedBits(1));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let der = format!("{}0000", g_der_hex());
        let raw = hex::decode(&der).unwrap();
        assert_eq!(decode_der(&raw).unwrap_err(), DerError::TrailingBytes(2));
        assert_eq!(decode(&der).unwrap_err().code, ErrorCode::MalformedKeyEncoding);
    }

    #[test]
    fn test_rejects_indefinite_length() {
        assert!(matches!(
            decode_der(&[0x30, 0x80, 0x00, 0x00]),
            Err(DerError::UnsupportedLength { offset: 1, byte: 0x80 })
        ));
    }
}
