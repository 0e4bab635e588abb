//! Transaction Broadcaster
//!
//! Hands a verified signed transaction to the ledger. No retries here:
//! resubmitting is the caller's decision since the nonce is already spent
//! once the ledger accepts it.

use std::sync::Arc;

use crate::error::{ErrorCode, SignerError, SignerResult};
use crate::ledger::LedgerClient;
use crate::types::SignedTransaction;
use crate::utils::keccak256;
use crate::{log_info, log_warn};

pub struct Broadcaster {
    ledger: Arc<dyn LedgerClient>,
}

impl Broadcaster {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Submit the serialized transaction and return the ledger's hash
    pub async fn send(&self, signed: &SignedTransaction) -> SignerResult<String> {
        if signed.raw.is_empty() || keccak256(&signed.raw) != signed.hash {
            return Err(SignerError::invalid_input(
                "Signed transaction bytes do not match their hash",
            ));
        }

        log_info!(
            "broadcaster",
            "Sending signed transaction",
            tx_hash = signed.hash_hex(),
            nonce = signed.transaction.nonce,
        );

        let tx_hash = self
            .ledger
            .send_signed_transaction(&signed.raw)
            .await
            .map_err(|e| {
                log_warn!("broadcaster", "Ledger rejected transaction", error = e);
                e.recode(ErrorCode::BroadcastFailed, "Ledger did not accept the transaction")
            })?;

        if !tx_hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            log_warn!(
                "broadcaster",
                "Ledger reported a different transaction hash",
                expected_hash = signed.hash_hex(),
                reported_hash = tx_hash,
            );
        }

        log_info!("broadcaster", "Transaction sent", tx_hash = tx_hash);
        Ok(tx_hash)
    }
}
