//! Signing Pipeline
//!
//! `SigningSession` is the record handed from stage to stage. Each stage
//! reads what earlier stages left in it and stores its own output. A failed
//! stage leaves everything before it in place, so a later `run` resumes at
//! the first missing result instead of starting over. In particular a
//! submitted operation id is never resubmitted.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::custody::{CustodyApi, HttpCustodyClient, SigningCoordinator, Vault};
use crate::error::{SignerError, SignerResult};
use crate::ledger::{self, JsonRpcLedger, LedgerClient, PENDING_BLOCK};
use crate::tx::{self, Broadcaster};
use crate::types::{AddressInfo, ChainAddress, PendingTransaction, SignOperation, SignedTransaction};
use crate::utils::CancelSignal;
use crate::wallet;
use crate::{log_info, log_warn};

/// Progress of a session, derived from which results are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    New,
    AddressCreated,
    Funded,
    Built,
    Submitted,
    Approved,
    Assembled,
    Broadcast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_info: Option<AddressInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_operation: Option<SignOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<SignedTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl SigningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known address, e.g. one created in an earlier run
    pub fn with_address(address_info: AddressInfo) -> Self {
        Self {
            address_info: Some(address_info),
            ..Self::default()
        }
    }

    pub fn stage(&self) -> SessionStage {
        if self.tx_hash.is_some() {
            SessionStage::Broadcast
        } else if self.signed.is_some() {
            SessionStage::Assembled
        } else if self.sign_operation.as_ref().is_some_and(SignOperation::is_completed) {
            SessionStage::Approved
        } else if self.operation_id.is_some() {
            SessionStage::Submitted
        } else if self.pending.is_some() {
            SessionStage::Built
        } else if self.balance.is_some_and(|b| !b.is_zero()) {
            SessionStage::Funded
        } else if self.address_info.is_some() {
            SessionStage::AddressCreated
        } else {
            SessionStage::New
        }
    }

    /// Drop the current transaction and everything derived from it.
    ///
    /// Needed after a terminal signing failure: the next run builds a new
    /// transaction (fresh nonce and gas price) and submits a new request.
    /// The balance is cleared too so it is read again.
    pub fn abandon_pending(&mut self) {
        self.balance = None;
        self.pending = None;
        self.operation_id = None;
        self.sign_operation = None;
        self.signed = None;
        self.tx_hash = None;
    }

    fn address(&self) -> SignerResult<&AddressInfo> {
        self.address_info
            .as_ref()
            .ok_or_else(|| SignerError::invalid_input("Session has no address yet"))
    }

    fn pending(&self) -> SignerResult<&PendingTransaction> {
        self.pending
            .as_ref()
            .ok_or_else(|| SignerError::invalid_input("Session has no pending transaction"))
    }
}

/// Runs session stages against a custody service and a ledger
pub struct Pipeline {
    config: Config,
    custody: Arc<dyn CustodyApi>,
    ledger: Arc<dyn LedgerClient>,
    coordinator: SigningCoordinator,
    broadcaster: Broadcaster,
}

impl Pipeline {
    pub fn new(config: Config, custody: Arc<dyn CustodyApi>, ledger: Arc<dyn LedgerClient>) -> Self {
        let coordinator = SigningCoordinator::new(custody.clone(), config.poll_config());
        let broadcaster = Broadcaster::new(ledger.clone());
        Self {
            config,
            custody,
            ledger,
            coordinator,
            broadcaster,
        }
    }

    /// Pipeline over the HTTP custody API and JSON-RPC ledger named in `config`
    pub fn from_config(config: Config) -> SignerResult<Self> {
        config.validate()?;
        if !tx::is_testnet_chain(config.chain_id) {
            log_warn!("pipeline", "Signing for a non-test chain", chain_id = config.chain_id);
        }
        let custody = HttpCustodyClient::new(config.custody_url.clone(), config.http_timeout)?;
        let ledger = JsonRpcLedger::new(config.ledger_url.clone(), config.http_timeout)?;
        Ok(Self::new(config, Arc::new(custody), Arc::new(ledger)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the configured vault and check it is usable
    pub async fn vault_status(&self) -> SignerResult<Vault> {
        let vault = self.custody.get_vault(&self.config.vault_id).await?;
        if !vault.is_active {
            log_warn!("pipeline", "Vault is not active", vault_id = self.config.vault_id);
        }
        Ok(vault)
    }

    /// Generate a key in the vault and record its address
    pub async fn create_address(&self, session: &mut SigningSession) -> SignerResult<AddressInfo> {
        let info = wallet::create_address(self.custody.as_ref(), &self.config.vault_id).await?;
        session.address_info = Some(info.clone());
        Ok(info)
    }

    /// Block until the session address holds a non-zero balance
    pub async fn wait_for_deposit(
        &self,
        session: &mut SigningSession,
        cancel: Option<CancelSignal>,
    ) -> SignerResult<U256> {
        let address = session.address()?.address;
        let balance = ledger::wait_for_deposit(
            self.ledger.as_ref(),
            &address,
            self.config.deposit_poll_interval,
            cancel,
        )
        .await?;
        session.balance = Some(balance);
        Ok(balance)
    }

    /// Build the sweep transaction to `to` from current network conditions
    pub async fn build_transaction(
        &self,
        session: &mut SigningSession,
        to: ChainAddress,
    ) -> SignerResult<PendingTransaction> {
        let from = session.address()?.address;
        let balance = session
            .balance
            .filter(|b| !b.is_zero())
            .ok_or_else(|| SignerError::insufficient_funds(format!("No confirmed balance for {}", from)))?;

        let gas_price = self.ledger.get_gas_price().await?;
        let gas_limit = self.ledger.estimate_gas(&to, balance).await?;
        let nonce = self.ledger.get_transaction_count(&from, PENDING_BLOCK).await?;

        let unsigned = tx::build_transaction(
            from,
            balance,
            to,
            gas_price,
            gas_limit,
            nonce,
            self.config.chain_id,
        )?;
        let pending = PendingTransaction::new(unsigned);

        log_info!(
            "pipeline",
            "Transaction built",
            from = from,
            to = to,
            value = pending.transaction.value,
            nonce = nonce,
            hash_to_sign = pending.hash_hex(),
        );

        session.pending = Some(pending.clone());
        Ok(pending)
    }

    /// Submit the pending transaction for quorum signing. Returns the
    /// existing operation id if one was already submitted.
    pub async fn request_signature(&self, session: &mut SigningSession) -> SignerResult<String> {
        if let Some(operation_id) = &session.operation_id {
            return Ok(operation_id.clone());
        }

        let address = session.address()?;
        let request = session
            .pending()?
            .sign_request(address.public_key_der.clone(), self.config.sign_description.clone())?;

        let operation_id = self
            .coordinator
            .request_signature(&self.config.vault_id, &request)
            .await?;
        session.operation_id = Some(operation_id.clone());
        Ok(operation_id)
    }

    /// Wait for the submitted operation to complete
    pub async fn await_signature(
        &self,
        session: &mut SigningSession,
        cancel: Option<CancelSignal>,
    ) -> SignerResult<SignOperation> {
        let operation_id = session
            .operation_id
            .clone()
            .ok_or_else(|| SignerError::invalid_input("Session has no sign operation"))?;

        let op = self.coordinator.await_completion(&operation_id, cancel).await?;
        session.sign_operation = Some(op.clone());
        Ok(op)
    }

    /// Combine the quorum signature with the pending transaction
    pub fn assemble(&self, session: &mut SigningSession) -> SignerResult<SignedTransaction> {
        let op = session
            .sign_operation
            .as_ref()
            .filter(|op| op.is_completed())
            .ok_or_else(|| SignerError::invalid_input("Session has no completed sign operation"))?;

        let signed = tx::assemble(&session.pending()?.transaction, op)?;
        session.signed = Some(signed.clone());
        Ok(signed)
    }

    /// Send the signed transaction to the ledger
    pub async fn broadcast(&self, session: &mut SigningSession) -> SignerResult<String> {
        let signed = session
            .signed
            .as_ref()
            .ok_or_else(|| SignerError::invalid_input("Session has no signed transaction"))?;

        let tx_hash = self.broadcaster.send(signed).await?;
        session.tx_hash = Some(tx_hash.clone());
        Ok(tx_hash)
    }

    /// Run every stage whose result is missing, in order, and return the
    /// broadcast transaction hash.
    ///
    /// A session that already holds a transaction must be resumed with the
    /// same recipient; `abandon_pending` is the way to send elsewhere.
    pub async fn run(
        &self,
        session: &mut SigningSession,
        to: ChainAddress,
        cancel: Option<CancelSignal>,
    ) -> SignerResult<String> {
        if let Some(pending) = &session.pending {
            if pending.transaction.to != to {
                return Err(SignerError::invalid_input(
                    "Session already holds a transaction for a different recipient",
                )
                .with_details(format!(
                    "session_to={} requested_to={}",
                    pending.transaction.to, to
                )));
            }
        }
        if session.address_info.is_none() {
            self.create_address(session).await?;
        }
        if session.balance.map_or(true, |b| b.is_zero()) {
            self.wait_for_deposit(session, cancel.clone()).await?;
        }
        if session.pending.is_none() {
            self.build_transaction(session, to).await?;
        }
        if session.operation_id.is_none() {
            self.request_signature(session).await?;
        }
        if !session.sign_operation.as_ref().is_some_and(SignOperation::is_completed) {
            self.await_signature(session, cancel).await?;
        }
        if session.signed.is_none() {
            self.assemble(session)?;
        }
        match &session.tx_hash {
            Some(tx_hash) => Ok(tx_hash.clone()),
            None => self.broadcast(session).await,
        }
    }
}
