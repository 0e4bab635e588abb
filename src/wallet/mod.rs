//! Wallet Module
//!
//! Public key decoding and address derivation for keys held by the
//! custody service.

mod address;
pub mod key_codec;

pub use address::*;
pub use key_codec::DerError;

use crate::custody::CustodyApi;
use crate::error::SignerResult;
use crate::types::{AddressInfo, ETH_COIN_ID};
use crate::log_info;

/// Decode a DER public key and derive its address
pub fn address_info_from_der(public_key_der: &str) -> SignerResult<AddressInfo> {
    let key = key_codec::decode(public_key_der)?;
    let address = derive_address(&key)?;

    Ok(AddressInfo {
        address,
        public_key_der: public_key_der.trim().to_string(),
        public_key_raw: key.to_hex(),
    })
}

/// Ask the custody service for a fresh key in `vault_id` and derive its address
pub async fn create_address(custody: &dyn CustodyApi, vault_id: &str) -> SignerResult<AddressInfo> {
    log_info!("wallet", "Generating public key with custody service", vault_id = vault_id);

    let public_key_der = custody.create_address(vault_id, ETH_COIN_ID).await?;
    let info = address_info_from_der(&public_key_der)?;

    log_info!("wallet", "Generated address", address = info.address);
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const G_DER: &str = "3056301006072a8648ce3d020106052b8104000a034200\
                         0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
                         483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    #[test]
    fn test_address_info_from_der() {
        let info = address_info_from_der(G_DER).unwrap();
        assert_eq!(info.address.to_hex(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
        assert_eq!(info.public_key_der, G_DER);
        assert_eq!(info.public_key_raw.len(), 130);
        assert!(info.public_key_raw.starts_with("0479be66"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["publicKeyDER"], G_DER);
        assert_eq!(json["publicKeyRaw"], info.public_key_raw);
    }

    #[test]
    fn test_error_kinds_propagate() {
        assert_eq!(
            address_info_from_der("3000").unwrap_err().code,
            ErrorCode::MalformedKeyEncoding
        );

        // Well-formed DER carrying a point that is not on the curve
        let off_curve = format!("{}{}", &G_DER[..G_DER.len() - 2], "b9");
        assert_eq!(
            address_info_from_der(&off_curve).unwrap_err().code,
            ErrorCode::InvalidPublicKey
        );
    }
}
