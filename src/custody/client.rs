//! HTTP client for the custody management API

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::{CreateAddressResponse, SignRequestBody, SignResponse, Vault};
use super::CustodyApi;
use crate::error::{SignerError, SignerResult};
use crate::types::SignOperation;
use crate::utils::{build_client, join_url, read_json};

/// Custody API over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpCustodyClient {
    base_url: String,
    client: Client,
}

impl HttpCustodyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SignerResult<Self> {
        Ok(Self::with_client(base_url, build_client(timeout)?))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn address_url(&self, vault_id: &str, coin_id: u32) -> String {
        self.url(&format!(
            "vaults/{}/coins/{}/accounts/0/chains/external/addresses",
            urlencoding::encode(vault_id),
            coin_id
        ))
    }

    fn sign_url(&self, vault_id: &str) -> String {
        self.url(&format!("vaults/{}/sign", urlencoding::encode(vault_id)))
    }

    /// The id comes from the service; it is encoded as a single path segment
    fn operation_url(&self, operation_id: &str) -> String {
        self.url(&format!("operations/sign/{}", urlencoding::encode(operation_id)))
    }

    fn vault_url(&self, vault_id: &str) -> String {
        self.url(&format!("vaults/{}", urlencoding::encode(vault_id)))
    }
}

#[async_trait]
impl CustodyApi for HttpCustodyClient {
    async fn create_address(&self, vault_id: &str, coin_id: u32) -> SignerResult<String> {
        let url = self.address_url(vault_id, coin_id);

        let response = self.client.post(&url).send().await.map_err(SignerError::from)?;
        let body: CreateAddressResponse = read_json(response, "Address generation").await?;
        Ok(body.public_key)
    }

    async fn request_signature(&self, vault_id: &str, body: &SignRequestBody) -> SignerResult<String> {
        let url = self.sign_url(vault_id);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(SignerError::from)?;
        let body: SignResponse = read_json(response, "Sign request").await?;
        Ok(body.operation_id)
    }

    async fn get_sign_operation(&self, operation_id: &str) -> SignerResult<SignOperation> {
        let url = self.operation_url(operation_id);

        let response = self.client.get(&url).send().await.map_err(SignerError::from)?;
        read_json(response, "Sign operation status").await
    }

    async fn get_vault(&self, vault_id: &str) -> SignerResult<Vault> {
        let url = self.vault_url(vault_id);

        let response = self.client.get(&url).send().await.map_err(SignerError::from)?;
        read_json(response, "Vault lookup").await
    }
}
