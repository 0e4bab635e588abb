//! Signer Configuration
//!
//! Endpoints, network and polling settings. Values are passed explicitly
//! into the clients and the session; nothing here is global.

use std::time::Duration;
use url::Url;

use crate::custody::{PollConfig, DEFAULT_POLL_INTERVAL};
use crate::error::{SignerError, SignerResult};
use crate::types::{ChainAddress, DEFAULT_CHAIN_ID};
use crate::log_warn;

pub const DEFAULT_CUSTODY_URL: &str = "https://localhost/casp/api/v1.0/mng";
pub const DEFAULT_LEDGER_URL: &str = "http://localhost:8545";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SIGN_DESCRIPTION: &str = "Ether transfer";

/// Environment variable names
pub mod env {
    pub const CUSTODY_URL: &str = "QUORUM_CUSTODY_URL";
    pub const LEDGER_URL: &str = "QUORUM_LEDGER_URL";
    pub const CHAIN_ID: &str = "QUORUM_CHAIN_ID";
    pub const VAULT_ID: &str = "QUORUM_VAULT_ID";
    pub const RECIPIENT: &str = "QUORUM_RECIPIENT";
    pub const POLL_INTERVAL_MS: &str = "QUORUM_POLL_INTERVAL_MS";
    pub const DEPOSIT_POLL_INTERVAL_MS: &str = "QUORUM_DEPOSIT_POLL_INTERVAL_MS";
    pub const SIGNING_TIMEOUT_SECS: &str = "QUORUM_SIGNING_TIMEOUT_SECS";
    pub const HTTP_TIMEOUT_SECS: &str = "QUORUM_HTTP_TIMEOUT_SECS";
    pub const SIGN_DESCRIPTION: &str = "QUORUM_SIGN_DESCRIPTION";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Custody management API base URL
    pub custody_url: String,
    /// Ledger JSON-RPC endpoint
    pub ledger_url: String,
    pub chain_id: u64,
    pub vault_id: String,
    /// Default destination for `send`
    pub recipient: Option<ChainAddress>,
    /// Delay between sign operation polls
    pub poll_interval: Duration,
    /// Delay between balance polls while waiting for a deposit
    pub deposit_poll_interval: Duration,
    /// Upper bound on the quorum wait; unbounded when `None`
    pub signing_timeout: Option<Duration>,
    pub http_timeout: Duration,
    /// Description shown to approvers with each sign request
    pub sign_description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            custody_url: DEFAULT_CUSTODY_URL.to_string(),
            ledger_url: DEFAULT_LEDGER_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            vault_id: String::new(),
            recipient: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deposit_poll_interval: DEFAULT_POLL_INTERVAL,
            signing_timeout: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            sign_description: DEFAULT_SIGN_DESCRIPTION.to_string(),
        }
    }
}

impl Config {
    /// Read settings from `QUORUM_*` environment variables over the defaults
    pub fn from_env() -> SignerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> SignerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::CUSTODY_URL) {
            config.custody_url = url;
        }
        if let Some(url) = get(env::LEDGER_URL) {
            config.ledger_url = url;
        }
        if let Some(raw) = get(env::CHAIN_ID) {
            config.chain_id = parse_number(env::CHAIN_ID, &raw)?;
        }
        if let Some(vault_id) = get(env::VAULT_ID) {
            config.vault_id = vault_id;
        }
        if let Some(raw) = get(env::RECIPIENT) {
            let recipient = raw.parse().map_err(|e: SignerError| {
                SignerError::config_error(format!("{} is not an address", env::RECIPIENT))
                    .with_details(e.message)
            })?;
            config.recipient = Some(recipient);
        }
        if let Some(raw) = get(env::POLL_INTERVAL_MS) {
            config.poll_interval = Duration::from_millis(parse_number(env::POLL_INTERVAL_MS, &raw)?);
        }
        if let Some(raw) = get(env::DEPOSIT_POLL_INTERVAL_MS) {
            config.deposit_poll_interval =
                Duration::from_millis(parse_number(env::DEPOSIT_POLL_INTERVAL_MS, &raw)?);
        }
        if let Some(raw) = get(env::SIGNING_TIMEOUT_SECS) {
            config.signing_timeout =
                Some(Duration::from_secs(parse_number(env::SIGNING_TIMEOUT_SECS, &raw)?));
        }
        if let Some(raw) = get(env::HTTP_TIMEOUT_SECS) {
            config.http_timeout = Duration::from_secs(parse_number(env::HTTP_TIMEOUT_SECS, &raw)?);
        }
        if let Some(description) = get(env::SIGN_DESCRIPTION) {
            config.sign_description = description;
        }

        Ok(config)
    }

    pub fn with_custody_url(mut self, url: impl Into<String>) -> Self {
        self.custody_url = url.into();
        self
    }

    pub fn with_ledger_url(mut self, url: impl Into<String>) -> Self {
        self.ledger_url = url.into();
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_vault_id(mut self, vault_id: impl Into<String>) -> Self {
        self.vault_id = vault_id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_deposit_poll_interval(mut self, interval: Duration) -> Self {
        self.deposit_poll_interval = interval;
        self
    }

    pub fn with_signing_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.signing_timeout = timeout;
        self
    }

    /// Polling settings for the signing coordinator
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::default()
            .with_interval(self.poll_interval)
            .with_max_wait(self.signing_timeout)
    }

    /// Check endpoints and required fields
    pub fn validate(&self) -> SignerResult<()> {
        validate_endpoint("custody URL", &self.custody_url)?;
        validate_endpoint("ledger URL", &self.ledger_url)?;

        if self.vault_id.trim().is_empty() {
            return Err(SignerError::config_error(format!(
                "Vault id is required (set {})",
                env::VAULT_ID
            )));
        }
        if self.chain_id == 0 {
            return Err(SignerError::config_error("Chain id must be non-zero"));
        }
        if self.poll_interval.is_zero() || self.deposit_poll_interval.is_zero() {
            return Err(SignerError::config_error("Poll intervals must be non-zero"));
        }
        if self.http_timeout.is_zero() {
            return Err(SignerError::config_error("HTTP timeout must be non-zero"));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> SignerResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| SignerError::config_error(format!("{} is not a valid number: {}", key, e)))
}

fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
}

/// Parse an endpoint URL. HTTPS is required except for local hosts.
pub fn validate_endpoint(name: &str, raw: &str) -> SignerResult<Url> {
    let parsed = Url::parse(raw).map_err(|e| {
        SignerError::config_error(format!("Invalid {}: {}", name, e))
    })?;

    let host = parsed
        .host_str()
        .ok_or_else(|| SignerError::config_error(format!("{} has no host", name)))?;

    match parsed.scheme() {
        "https" => {}
        "http" if is_local_host(host) => {}
        "http" => {
            return Err(SignerError::config_error(format!(
                "{} must use HTTPS for remote host {}",
                name, host
            )))
        }
        other => {
            return Err(SignerError::config_error(format!(
                "Unsupported {} scheme: {}",
                name, other
            )))
        }
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        log_warn!("config", "Credentials embedded in endpoint URL", endpoint = name);
    }

    Ok(parsed)
}
