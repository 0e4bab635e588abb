//! Custody Module
//!
//! Access to the remote custody service that holds keys and runs the
//! approval quorum, plus the coordinator that drives a signing round.

mod client;
mod coordinator;
mod types;

pub use client::*;
pub use coordinator::*;
pub use types::*;

use async_trait::async_trait;

use crate::error::SignerResult;
use crate::types::SignOperation;

/// Operations the custody service exposes to the pipeline
#[async_trait]
pub trait CustodyApi: Send + Sync {
    /// Generate a key in the vault and return its DER public key as hex
    async fn create_address(&self, vault_id: &str, coin_id: u32) -> SignerResult<String>;

    /// Submit data for quorum signing and return the operation id
    async fn request_signature(&self, vault_id: &str, body: &SignRequestBody) -> SignerResult<String>;

    /// Current state of a signing operation
    async fn get_sign_operation(&self, operation_id: &str) -> SignerResult<SignOperation>;

    /// Read a vault record
    async fn get_vault(&self, vault_id: &str) -> SignerResult<Vault>;
}
