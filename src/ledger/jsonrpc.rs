//! Ethereum JSON-RPC ledger client

use async_trait::async_trait;
use ethers_core::types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::LedgerClient;
use crate::error::{SignerError, SignerResult};
use crate::types::ChainAddress;
use crate::utils::{build_client, parse_hex_u256, parse_hex_u64, read_json, to_hex_quantity};
use crate::log_debug;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Ledger access over a single JSON-RPC endpoint
#[derive(Debug)]
pub struct JsonRpcLedger {
    rpc_url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> SignerResult<Self> {
        Ok(Self::with_client(rpc_url, build_client(timeout)?))
    }

    pub fn with_client(rpc_url: impl Into<String>, client: Client) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> SignerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log_debug!("ledger", "JSON-RPC call", method = method, id = id);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                method,
                params,
                id,
            })
            .send()
            .await
            .map_err(SignerError::from)?;

        let body: RpcResponse<T> = read_json(response, method).await?;

        if let Some(error) = body.error {
            return Err(SignerError::network_error(format!("{} returned error {}", method, error.code))
                .with_details(error.message));
        }

        body.result
            .ok_or_else(|| SignerError::parse_error(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn get_balance(&self, address: &ChainAddress) -> SignerResult<U256> {
        let hex: String = self
            .call("eth_getBalance", serde_json::json!([address.to_hex(), "latest"]))
            .await?;
        parse_hex_u256(&hex)
    }

    async fn get_gas_price(&self) -> SignerResult<U256> {
        let hex: String = self.call("eth_gasPrice", serde_json::json!([])).await?;
        parse_hex_u256(&hex)
    }

    async fn estimate_gas(&self, to: &ChainAddress, value: U256) -> SignerResult<U256> {
        let hex: String = self
            .call(
                "eth_estimateGas",
                serde_json::json!([{ "to": to.to_hex(), "value": to_hex_quantity(value) }]),
            )
            .await?;
        parse_hex_u256(&hex)
    }

    async fn get_transaction_count(&self, address: &ChainAddress, block: &str) -> SignerResult<u64> {
        let hex: String = self
            .call("eth_getTransactionCount", serde_json::json!([address.to_hex(), block]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn send_signed_transaction(&self, raw: &[u8]) -> SignerResult<String> {
        self.call(
            "eth_sendRawTransaction",
            serde_json::json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }
}
