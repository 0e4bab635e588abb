//! Custody service wire types

use serde::{Deserialize, Serialize};

use crate::types::SignRequest;

/// Response to address generation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressResponse {
    /// DER SubjectPublicKeyInfo, hex encoded
    pub public_key: String,
}

/// Body of `POST /vaults/{id}/sign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestBody {
    pub data_to_sign: Vec<String>,
    pub public_keys: Vec<String>,
    pub description: String,
    pub details: String,
}

impl From<&SignRequest> for SignRequestBody {
    fn from(request: &SignRequest) -> Self {
        Self {
            data_to_sign: vec![hex::encode(request.hash_to_sign)],
            public_keys: vec![request.public_key_der.clone()],
            description: request.description.clone(),
            details: request.details.clone(),
        }
    }
}

/// Response to a sign request
#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    #[serde(rename = "operationID", alias = "operationId")]
    pub operation_id: String,
}

/// Vault record.
///
/// Older service versions report the identifier as `vaultID`, newer ones
/// as `id`. Both are kept and `id()` picks whichever is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "vaultID", skip_serializing_if = "Option::is_none")]
    pub vault_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<String>,
}

impl Vault {
    pub fn id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.vault_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_request_body_shape() {
        let request = SignRequest {
            hash_to_sign: [0xab; 32],
            public_key_der: "3056".to_string(),
            description: "transfer".to_string(),
            details: "{}".to_string(),
        };
        let json = serde_json::to_value(SignRequestBody::from(&request)).unwrap();

        assert_eq!(json["dataToSign"][0], "ab".repeat(32));
        assert_eq!(json["publicKeys"][0], "3056");
        assert_eq!(json["description"], "transfer");
        assert_eq!(json["details"], "{}");
    }

    #[test]
    fn test_sign_response_field_names() {
        let r: SignResponse = serde_json::from_str(r#"{"operationID":"op-1"}"#).unwrap();
        assert_eq!(r.operation_id, "op-1");
        let r: SignResponse = serde_json::from_str(r#"{"operationId":"op-2"}"#).unwrap();
        assert_eq!(r.operation_id, "op-2");
    }

    #[test]
    fn test_vault_accepts_either_id_field() {
        let v: Vault = serde_json::from_str(r#"{"id":"v1","name":"main","isActive":true}"#).unwrap();
        assert_eq!(v.id(), Some("v1"));
        assert!(v.is_active);

        let v: Vault = serde_json::from_str(r#"{"vaultID":"v2","name":"legacy"}"#).unwrap();
        assert_eq!(v.id(), Some("v2"));
        assert!(!v.is_active);

        let v: Vault = serde_json::from_str(r#"{"id":"v3","vaultID":"v2"}"#).unwrap();
        assert_eq!(v.id(), Some("v3"));

        let v: Vault = serde_json::from_str(r#"{"name":"anonymous"}"#).unwrap();
        assert_eq!(v.id(), None);
    }
}
