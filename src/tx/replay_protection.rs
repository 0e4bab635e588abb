//! Transaction Replay Protection
//!
//! EIP-155 binds a legacy signature to one chain by folding the chain id
//! into `v`: `v = chain_id * 2 + 35 + recovery`.

use crate::error::{SignerError, SignerResult};

/// Chain IDs the signer is commonly pointed at
pub mod chain_ids {
    pub const ETHEREUM: u64 = 1;
    pub const ROPSTEN: u64 = 3;
    pub const RINKEBY: u64 = 4;
    pub const GOERLI: u64 = 5;
    pub const SEPOLIA: u64 = 11155111;
}

/// Check if a chain ID is for a testnet
pub fn is_testnet_chain(chain_id: u64) -> bool {
    matches!(
        chain_id,
        chain_ids::ROPSTEN | chain_ids::RINKEBY | chain_ids::GOERLI | chain_ids::SEPOLIA
    )
}

/// Map the custody service's recovery value to a 0/1 recovery id.
///
/// Older service releases return the pre-EIP-155 `27`/`28` with the
/// parity inverted relative to current releases, which return `0`/`1`.
pub fn normalize_recovery(v: i64) -> SignerResult<u8> {
    match v {
        27 => Ok(1),
        28 => Ok(0),
        0 => Ok(0),
        1 => Ok(1),
        other => Err(SignerError::invalid_recovery_value(format!(
            "Unsupported recovery value {}",
            other
        ))),
    }
}

/// EIP-155 `v` for a recovery id on `chain_id`
pub fn eip155_v(chain_id: u64, recovery: u8) -> SignerResult<u64> {
    if recovery > 1 {
        return Err(SignerError::invalid_recovery_value(format!(
            "Recovery id must be 0 or 1, got {}",
            recovery
        )));
    }

    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + recovery as u64))
        .ok_or_else(|| SignerError::invalid_input(format!("Chain id {} is too large", chain_id)))
}

/// Chain id encoded in an EIP-155 `v`, `None` for pre-EIP-155 values
pub fn chain_id_from_v(v: u64) -> Option<u64> {
    if v >= 35 {
        Some((v - 35) / 2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_normalize_recovery() {
        assert_eq!(normalize_recovery(27).unwrap(), 1);
        assert_eq!(normalize_recovery(28).unwrap(), 0);
        assert_eq!(normalize_recovery(0).unwrap(), 0);
        assert_eq!(normalize_recovery(1).unwrap(), 1);

        for bad in [2, 26, 29, 35, 37, -1] {
            let err = normalize_recovery(bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidRecoveryValue);
        }
    }

    #[test]
    fn test_eip155_v() {
        assert_eq!(eip155_v(chain_ids::ETHEREUM, 0).unwrap(), 37);
        assert_eq!(eip155_v(chain_ids::ETHEREUM, 1).unwrap(), 38);
        assert_eq!(eip155_v(chain_ids::ROPSTEN, 1).unwrap(), 42);
        assert_eq!(eip155_v(chain_ids::ROPSTEN, 0).unwrap(), 41);
        assert!(eip155_v(u64::MAX, 0).is_err());
        assert!(eip155_v(1, 2).is_err());
    }

    #[test]
    fn test_chain_id_from_v() {
        assert_eq!(chain_id_from_v(42), Some(chain_ids::ROPSTEN));
        assert_eq!(chain_id_from_v(41), Some(chain_ids::ROPSTEN));
        assert_eq!(chain_id_from_v(27), None);
    }

    #[test]
    fn test_testnet_detection() {
        assert!(is_testnet_chain(chain_ids::ROPSTEN));
        assert!(is_testnet_chain(chain_ids::SEPOLIA));
        assert!(!is_testnet_chain(chain_ids::ETHEREUM));
    }
}
