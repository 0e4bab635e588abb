//! Transaction Builder
//!
//! Builds the legacy EIP-155 transfer that sweeps an address: the whole
//! balance is sent, minus whatever the gas fee would overdraw.

use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{TransactionRequest, U256};
use serde::Serialize;

use crate::error::{SignerError, SignerResult};
use crate::types::{ChainAddress, PendingTransaction, SignRequest, TxData, UnsignedTransaction};
use crate::utils::to_hex_quantity;

/// Build an unsigned transfer of the available balance.
///
/// The value starts at `available_balance`; if value plus the legacy fee
/// (`gas_price * gas_limit`) exceeds the balance, the value is lowered by
/// the excess. A value that would go negative, or arithmetic overflow, is
/// `InsufficientFunds`.
pub fn build_transaction(
    from: ChainAddress,
    available_balance: U256,
    to: ChainAddress,
    gas_price: U256,
    gas_limit: U256,
    nonce: u64,
    chain_id: u64,
) -> SignerResult<UnsignedTransaction> {
    if available_balance.is_zero() {
        return Err(SignerError::insufficient_funds(format!("Address {} has no balance", from)));
    }

    let mut tx = UnsignedTransaction {
        from,
        to,
        value: available_balance,
        nonce,
        gas_price,
        gas_limit,
        chain_id,
    };

    let cost = tx.upfront_cost().ok_or_else(|| {
        SignerError::insufficient_funds("Transaction cost overflows")
            .with_details(format!("gas_price={} gas_limit={}", gas_price, gas_limit))
    })?;

    if cost > available_balance {
        let excess = cost - available_balance;
        tx.value = available_balance.checked_sub(excess).ok_or_else(|| {
            SignerError::insufficient_funds("Balance does not cover the gas fee")
                .with_details(format!("balance={} fee={}", available_balance, excess))
        })?;
    }

    Ok(tx)
}

impl UnsignedTransaction {
    /// `value + gas_price * gas_limit`, or `None` on overflow
    pub fn upfront_cost(&self) -> Option<U256> {
        self.gas_price
            .checked_mul(self.gas_limit)
            .and_then(|fee| fee.checked_add(self.value))
    }

    pub fn to_typed(&self) -> TypedTransaction {
        let request = TransactionRequest::new()
            .from(self.from)
            .to(ethers_core::types::Address::from(self.to))
            .value(self.value)
            .gas(self.gas_limit)
            .gas_price(self.gas_price)
            .nonce(self.nonce)
            .chain_id(self.chain_id);
        TypedTransaction::Legacy(request)
    }

    /// EIP-155 pre-signature digest
    pub fn sighash(&self) -> [u8; 32] {
        self.to_typed().sighash().0
    }

    /// Canonical hex field rendering shown to approvers
    pub fn tx_data(&self) -> TxData {
        TxData {
            from: self.from.to_hex(),
            to: self.to.to_hex(),
            nonce: self.nonce,
            value: to_hex_quantity(self.value),
            gas_price: to_hex_quantity(self.gas_price),
            gas_limit: to_hex_quantity(self.gas_limit),
            chain_id: to_hex_quantity(U256::from(self.chain_id)),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalDetails {
    tx_data: TxData,
    hash_to_sign: String,
}

impl PendingTransaction {
    pub fn new(transaction: UnsignedTransaction) -> Self {
        let hash_to_sign = transaction.sighash();
        Self {
            transaction,
            hash_to_sign,
        }
    }

    /// `{ txData, hashToSign }` as indented JSON
    pub fn details_json(&self) -> SignerResult<String> {
        let details = ApprovalDetails {
            tx_data: self.transaction.tx_data(),
            hash_to_sign: self.hash_hex(),
        };
        Ok(serde_json::to_string_pretty(&details)?)
    }

    /// Sign request for this transaction with its approval details attached
    pub fn sign_request(
        &self,
        public_key_der: impl Into<String>,
        description: impl Into<String>,
    ) -> SignerResult<SignRequest> {
        Ok(SignRequest {
            hash_to_sign: self.hash_to_sign,
            public_key_der: public_key_der.into(),
            description: description.into(),
            details: self.details_json()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn addr(byte: u8) -> ChainAddress {
        ChainAddress::from_bytes([byte; 20])
    }

    fn wei(n: u128) -> U256 {
        U256::from(n)
    }

    #[test]
    fn test_fee_is_taken_from_value() {
        let balance = wei(1_000_000_000_000_000_000);
        let gas_price = wei(20_000_000_000);
        let tx = build_transaction(addr(1), balance, addr(2), gas_price, wei(21_000), 0, 3).unwrap();

        assert_eq!(tx.value, wei(1_000_000_000_000_000_000 - 20_000_000_000 * 21_000));
        assert_eq!(tx.upfront_cost().unwrap(), balance);
    }

    #[test]
    fn test_free_gas_sends_everything() {
        let tx = build_transaction(addr(1), wei(500), addr(2), U256::zero(), wei(21_000), 4, 3).unwrap();
        assert_eq!(tx.value, wei(500));
        assert_eq!(tx.nonce, 4);
    }

    #[test]
    fn test_fee_exactly_equal_to_balance() {
        let tx = build_transaction(addr(1), wei(42_000), addr(2), wei(2), wei(21_000), 0, 3).unwrap();
        assert_eq!(tx.value, U256::zero());
    }

    #[test]
    fn test_insufficient_funds() {
        let err = build_transaction(addr(1), wei(1_000), addr(2), wei(1), wei(21_000), 0, 3).unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);

        let err = build_transaction(addr(1), U256::zero(), addr(2), U256::zero(), wei(21_000), 0, 3)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
    }

    #[test]
    fn test_overflow_is_insufficient_funds() {
        let err = build_transaction(addr(1), wei(1), addr(2), U256::MAX, wei(2), 0, 3).unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
    }

    #[test]
    fn test_eip155_signing_hash() {
        // Example transaction from EIP-155
        let tx = UnsignedTransaction {
            from: addr(0),
            to: addr(0x35),
            value: wei(1_000_000_000_000_000_000),
            nonce: 9,
            gas_price: wei(20_000_000_000),
            gas_limit: wei(21_000),
            chain_id: 1,
        };
        assert_eq!(
            hex::encode(tx.sighash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_tx_data_rendering() {
        let tx = build_transaction(addr(0xab), wei(1_000_000), addr(0xcd), wei(10), wei(21_000), 7, 3).unwrap();
        let data = tx.tx_data();

        assert_eq!(data.from, format!("0x{}", "ab".repeat(20)));
        assert_eq!(data.to, format!("0x{}", "cd".repeat(20)));
        assert_eq!(data.nonce, 7);
        assert_eq!(data.value, "0xc0df0"); // 1_000_000 - 210_000
        assert_eq!(data.gas_price, "0xa");
        assert_eq!(data.gas_limit, "0x5208");
        assert_eq!(data.chain_id, "0x3");
    }

    #[test]
    fn test_pending_transaction_details() {
        let tx = build_transaction(addr(1), wei(1_000_000), addr(2), wei(1), wei(21_000), 0, 3).unwrap();
        let pending = PendingTransaction::new(tx.clone());
        assert_eq!(pending.hash_to_sign, tx.sighash());

        let details: serde_json::Value = serde_json::from_str(&pending.details_json().unwrap()).unwrap();
        assert_eq!(details["hashToSign"], pending.hash_hex());
        assert_eq!(details["txData"]["gasLimit"], "0x5208");
        assert_eq!(details["txData"]["chainId"], "0x3");

        let request = pending.sign_request("3056aa", "transfer").unwrap();
        assert_eq!(request.hash_to_sign, pending.hash_to_sign);
        assert_eq!(request.public_key_der, "3056aa");
        assert!(request.details.contains("txData"));
    }
}
