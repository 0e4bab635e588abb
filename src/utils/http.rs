//! HTTP Client Helpers
//!
//! Builds the async client shared by the custody and ledger clients and
//! turns non-success responses into `SignerError`s carrying the service's
//! own error text.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ErrorCode, SignerError, SignerResult};

const USER_AGENT: &str = concat!("quorum-signer/", env!("CARGO_PKG_VERSION"));

/// Create an HTTP client with the given request timeout
pub fn build_client(timeout: Duration) -> SignerResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(5)
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SignerError::network_error(format!("Failed to create HTTP client: {}", e)))
}

/// Extract the most useful error text from a failed response body.
///
/// Preference order: `details`, then `error` (string or `{message}`), then
/// `message`, then the raw body.
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return Some(trimmed.to_string()),
    };

    let field = |name: &str| value.get(name).and_then(|v| v.as_str()).map(str::to_string);

    field("details")
        .or_else(|| field("error"))
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .or_else(|| field("message"))
        .or_else(|| Some(trimmed.to_string()))
}

/// Check the status and decode a JSON body
pub async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> SignerResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SignerError::network_error(format!("{}: failed to read body: {}", context, e)))?;

    if !status.is_success() {
        let reason = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        return Err(SignerError::new(
            ErrorCode::NetworkError,
            format!("{} failed with HTTP {}", context, status.as_u16()),
        )
        .with_details(reason));
    }

    serde_json::from_str(&body).map_err(|e| {
        SignerError::parse_error(format!("{}: unexpected response: {}", context, e))
    })
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
