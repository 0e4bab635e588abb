//! Signature Assembler
//!
//! Turns the quorum's raw `(r || s, v)` output into a broadcastable legacy
//! transaction. The serialized result is decoded again and the sender
//! recovered from it; anything other than the expected `from` address is
//! rejected, so a wrong recovery value or corrupted signature never leaves
//! this module as a signed transaction.

use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Signature, U256};
use ethers_core::utils::rlp::Rlp;

use super::replay_protection::{chain_id_from_v, eip155_v, normalize_recovery};
use crate::error::{SignerError, SignerResult};
use crate::types::{ChainAddress, SignOperation, SignedTransaction, UnsignedTransaction};
use crate::utils::{keccak256, strip_hex_prefix};
use crate::log_info;

/// Split a 64-byte `r || s` hex signature
pub fn split_signature(signature_hex: &str) -> SignerResult<([u8; 32], [u8; 32])> {
    let cleaned = strip_hex_prefix(signature_hex.trim());
    let bytes = hex::decode(cleaned).map_err(|e| {
        SignerError::malformed_signature(format!("Signature is not hex: {}", e))
    })?;

    if bytes.len() != 64 {
        return Err(SignerError::malformed_signature(format!(
            "Expected a 64-byte signature, got {} bytes",
            bytes.len()
        )));
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok((r, s))
}

/// Attach the quorum signature to `tx` and verify the result.
pub fn assemble(tx: &UnsignedTransaction, op: &SignOperation) -> SignerResult<SignedTransaction> {
    if op.signatures.len() != 1 || op.v.len() != 1 {
        return Err(SignerError::signature_count_mismatch(format!(
            "Expected one signature and one recovery value, got {} and {}",
            op.signatures.len(),
            op.v.len()
        )));
    }

    let (r, s) = split_signature(&op.signatures[0])?;
    let recovery = normalize_recovery(op.v[0])?;
    let v = eip155_v(tx.chain_id, recovery)?;

    let signature = Signature {
        r: U256::from_big_endian(&r),
        s: U256::from_big_endian(&s),
        v,
    };
    let raw = tx.to_typed().rlp_signed(&signature).to_vec();

    verify_sender(&raw, tx)?;

    let signed = SignedTransaction {
        transaction: tx.clone(),
        r,
        s,
        v,
        hash: keccak256(&raw),
        raw,
    };

    log_info!(
        "assembler",
        "Signed transaction assembled",
        from = tx.from,
        tx_hash = signed.hash_hex(),
        v = v,
    );
    Ok(signed)
}

/// Decode serialized signed bytes and check they recover to `tx.from` on
/// `tx.chain_id`.
pub fn verify_sender(raw: &[u8], tx: &UnsignedTransaction) -> SignerResult<()> {
    let rlp = Rlp::new(raw);
    let (decoded, signature) = TypedTransaction::decode_signed(&rlp).map_err(|e| {
        SignerError::verification_failed("Signed payload does not decode")
            .with_details(e.to_string())
    })?;

    let decoded_chain = chain_id_from_v(signature.v);
    if decoded_chain != Some(tx.chain_id) {
        return Err(SignerError::verification_failed(format!(
            "Signed payload is bound to chain {:?}, expected {}",
            decoded_chain, tx.chain_id
        )));
    }

    let recovered = signature.recover(decoded.sighash()).map_err(|e| {
        SignerError::verification_failed("Sender cannot be recovered from signature")
            .with_details(e.to_string())
    })?;

    let recovered = ChainAddress::from(recovered);
    if recovered != tx.from {
        return Err(SignerError::verification_failed(
            "Signature does not recover to the sending address",
        )
        .with_details(format!("recovered={} expected={}", recovered, tx.from)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{OperationStatus, PublicKey};
    use crate::wallet::derive_address;
    use secp256k1::{Message, Secp256k1, SecretKey};

    fn signer_key() -> SecretKey {
        SecretKey::from_slice(&[0x42; 32]).unwrap()
    }

    fn signer_address() -> ChainAddress {
        let public = secp256k1::PublicKey::from_secret_key(&Secp256k1::new(), &signer_key());
        derive_address(&PublicKey::from_bytes(public.serialize_uncompressed().to_vec())).unwrap()
    }

    fn unsigned(nonce: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            from: signer_address(),
            to: ChainAddress::from_bytes([0x35; 20]),
            value: U256::from(1_000_000u64),
            nonce,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: U256::from(21_000u64),
            chain_id: 3,
        }
    }

    /// Sign like the custody service: compact `r || s` hex plus a 0/1 id
    fn quorum_sign(tx: &UnsignedTransaction) -> (String, i64) {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(tx.sighash());
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&msg, &signer_key())
            .serialize_compact();
        (hex::encode(compact), recovery_id.to_i32() as i64)
    }

    fn completed(signature: String, v: i64) -> SignOperation {
        SignOperation {
            status: OperationStatus::Completed,
            signatures: vec![signature],
            v: vec![v],
        }
    }

    #[test]
    fn test_assemble_recovers_sender() {
        let tx = unsigned(0);
        let (signature, v) = quorum_sign(&tx);

        let signed = assemble(&tx, &completed(signature.clone(), v)).unwrap();
        assert_eq!(signed.v, 3 * 2 + 35 + v as u64);
        assert_eq!(hex::encode(signed.r), &signature[..64]);
        assert_eq!(hex::encode(signed.s), &signature[64..]);
        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert!(verify_sender(&signed.raw, &tx).is_ok());
    }

    #[test]
    fn test_signature_hex_forms() {
        let tx = unsigned(1);
        let (signature, v) = quorum_sign(&tx);

        let upper = format!("0x{}", signature.to_uppercase());
        assert!(assemble(&tx, &completed(upper, v)).is_ok());
    }

    #[test]
    fn test_wrong_recovery_fails_verification() {
        let tx = unsigned(2);
        let (signature, v) = quorum_sign(&tx);

        let err = assemble(&tx, &completed(signature, 1 - v)).unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureVerificationFailed);
        assert!(err.is_security_failure());
    }

    #[test]
    fn test_legacy_27_28_values() {
        let tx = unsigned(3);
        let (signature, v) = quorum_sign(&tx);
        // 27 maps to recovery 1 and 28 to recovery 0
        let legacy = if v == 1 { 27 } else { 28 };

        let signed = assemble(&tx, &completed(signature, legacy)).unwrap();
        assert_eq!(signed.v, 41 + v as u64);
    }

    #[test]
    fn test_count_mismatch() {
        let tx = unsigned(4);
        let (signature, v) = quorum_sign(&tx);

        let mut op = completed(signature.clone(), v);
        op.signatures.push(signature);
        assert_eq!(assemble(&tx, &op).unwrap_err().code, ErrorCode::SignatureCountMismatch);

        let op = SignOperation {
            status: OperationStatus::Completed,
            signatures: vec![],
            v: vec![],
        };
        assert_eq!(assemble(&tx, &op).unwrap_err().code, ErrorCode::SignatureCountMismatch);
    }

    #[test]
    fn test_malformed_signature() {
        let tx = unsigned(5);
        for bad in ["abcd".to_string(), "zz".repeat(64), "ab".repeat(65)] {
            let err = assemble(&tx, &completed(bad, 0)).unwrap_err();
            assert_eq!(err.code, ErrorCode::MalformedSignature);
        }
    }

    #[test]
    fn test_invalid_recovery_value() {
        let tx = unsigned(6);
        let (signature, _) = quorum_sign(&tx);
        let err = assemble(&tx, &completed(signature, 29)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRecoveryValue);
    }

    #[test]
    fn test_signature_for_other_sender_rejected() {
        let mut tx = unsigned(7);
        let (signature, v) = quorum_sign(&tx);
        tx.from = ChainAddress::from_bytes([0x99; 20]);

        let err = assemble(&tx, &completed(signature, v)).unwrap_err();
        assert_eq!(err.code, ErrorCode::SignatureVerificationFailed);
    }
}
