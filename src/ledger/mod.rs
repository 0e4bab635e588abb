//! Ledger Module
//!
//! Network reads (balance, gas, nonce) and raw transaction submission.

mod jsonrpc;

pub use jsonrpc::*;

use async_trait::async_trait;
use ethers_core::types::U256;
use std::time::Duration;

use crate::error::{SignerError, SignerResult};
use crate::types::ChainAddress;
use crate::utils::{is_cancelled, or_cancel, sleep_or_cancel, CancelSignal};
use crate::{log_debug, log_info, log_warn};

/// Block tag used for nonce lookups so queued transactions are counted
pub const PENDING_BLOCK: &str = "pending";

/// Ledger operations the pipeline depends on
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_balance(&self, address: &ChainAddress) -> SignerResult<U256>;

    async fn get_gas_price(&self) -> SignerResult<U256>;

    /// Gas needed to transfer `value` to `to`
    async fn estimate_gas(&self, to: &ChainAddress, value: U256) -> SignerResult<U256>;

    async fn get_transaction_count(&self, address: &ChainAddress, block: &str) -> SignerResult<u64>;

    /// Submit serialized signed bytes, returning the transaction hash
    async fn send_signed_transaction(&self, raw: &[u8]) -> SignerResult<String>;
}

/// Poll the balance of `address` until it is non-zero.
///
/// Lookup failures are logged and retried. Returns `SigningAborted` if the
/// cancellation switch flips.
pub async fn wait_for_deposit(
    ledger: &dyn LedgerClient,
    address: &ChainAddress,
    interval: Duration,
    mut cancel: Option<CancelSignal>,
) -> SignerResult<U256> {
    log_info!("ledger", "Waiting for deposit", address = address);

    loop {
        if is_cancelled(&cancel) {
            return Err(SignerError::signing_aborted("Stopped waiting for deposit"));
        }

        let Some(lookup) = or_cancel(ledger.get_balance(address), &mut cancel).await else {
            return Err(SignerError::signing_aborted("Stopped waiting for deposit"));
        };
        match lookup {
            Ok(balance) if !balance.is_zero() => {
                log_info!("ledger", "Deposit received", address = address, balance = balance);
                return Ok(balance);
            }
            Ok(_) => log_debug!("ledger", "Balance still zero", address = address),
            Err(e) => log_warn!("ledger", "Balance lookup failed, retrying", error = e),
        }

        if sleep_or_cancel(interval, &mut cancel).await {
            return Err(SignerError::signing_aborted("Stopped waiting for deposit"));
        }
    }
}
