//! Quorum Signer Library
//!
//! Moves funds out of an address whose private key lives in a remote
//! custody service, where every signature needs approval from a quorum of
//! vault participants.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: DER public key decoding and address derivation
//! - **tx**: Transaction building, signature assembly, broadcasting
//! - **custody**: Custody API client and the signing coordinator
//! - **ledger**: JSON-RPC ledger client and deposit polling
//! - **pipeline**: Resumable session tying the stages together
//!
//! Stages run strictly in order: derive address, wait for a deposit,
//! build the transaction, submit its hash for quorum signing, poll until
//! approved, assemble and verify the signed transaction, broadcast.
//!
//! # Security
//!
//! No private key material is handled here. An assembled transaction is
//! only returned after the sender recovered from its serialized bytes
//! matches the address the key was derived for.
//!
//! # Example
//!
//! ```rust,ignore
//! use quorum_signer::{Config, Pipeline, SigningSession};
//!
//! let pipeline = Pipeline::from_config(Config::from_env()?)?;
//! let mut session = SigningSession::new();
//! let tx_hash = pipeline.run(&mut session, recipient, None).await?;
//! ```

pub mod config;
pub mod custody;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod serde_bytes;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

// Re-export key types for convenience
pub use config::Config;
pub use error::{ErrorCode, SignerError, SignerResult};
pub use pipeline::{Pipeline, SessionStage, SigningSession};
pub use types::*;

// Re-export stage entry points
pub use custody::{CustodyApi, HttpCustodyClient, PollConfig, SigningCoordinator};
pub use ledger::{wait_for_deposit, JsonRpcLedger, LedgerClient};
pub use tx::{assemble, build_transaction, normalize_recovery, Broadcaster};
pub use wallet::{address_info_from_der, derive_address};

// Re-export crypto utilities for binaries
pub use utils::crypto::{keccak256, to_checksum_address};
