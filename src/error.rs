//! Unified error types for the quorum signer
//!
//! Every pipeline stage reports failures through `SignerError` so callers
//! can branch on `ErrorCode` without string matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all signing pipeline operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn malformed_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedKeyEncoding, msg)
    }

    pub fn invalid_public_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPublicKey, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientFunds, msg)
    }

    pub fn signing_request_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningRequestFailed, msg)
    }

    pub fn signing_operation_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningOperationFailed, msg)
    }

    pub fn signing_timed_out(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningTimedOut, msg)
    }

    pub fn signing_aborted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningAborted, msg)
    }

    pub fn signature_count_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignatureCountMismatch, msg)
    }

    pub fn malformed_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedSignature, msg)
    }

    pub fn invalid_recovery_value(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRecoveryValue, msg)
    }

    pub fn verification_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignatureVerificationFailed, msg)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Re-tag an error while keeping the original message as details.
    ///
    /// Used at stage boundaries where a transport failure has a
    /// stage-specific meaning (e.g. a failed submit is `SigningRequestFailed`).
    pub fn recode(self, code: ErrorCode, message: impl Into<String>) -> Self {
        let details = match self.details {
            Some(d) => format!("{} ({})", self.message, d),
            None => self.message,
        };
        Self::new(code, message).with_details(details)
    }

    /// Errors that must stop the pipeline before any remote signing request.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::MalformedKeyEncoding
                | ErrorCode::InvalidPublicKey
                | ErrorCode::InsufficientFunds
                | ErrorCode::InvalidAddress
                | ErrorCode::InvalidInput
        )
    }

    /// Signals a corrupted signature or a misbehaving signer.
    pub fn is_security_failure(&self) -> bool {
        self.code == ErrorCode::SignatureVerificationFailed
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Key and address errors
    MalformedKeyEncoding,
    InvalidPublicKey,
    InvalidAddress,
    InvalidInput,

    // Transaction errors
    InsufficientFunds,
    BroadcastFailed,

    // Quorum signing errors
    SigningRequestFailed,
    SigningOperationFailed,
    SigningTimedOut,
    SigningAborted,
    SignatureCountMismatch,
    MalformedSignature,
    InvalidRecoveryValue,
    SignatureVerificationFailed,

    // Environment errors
    ConfigError,
    NetworkError,
    ParseError,

    // Internal
    Internal,
}

/// Result type alias for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::ParseError, e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::new(ErrorCode::ParseError, format!("Invalid hex: {}", e))
    }
}

impl From<url::ParseError> for SignerError {
    fn from(e: url::ParseError) -> Self {
        SignerError::new(ErrorCode::ConfigError, format!("Invalid URL: {}", e))
    }
}

impl From<reqwest::Error> for SignerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignerError::new(ErrorCode::NetworkError, "Request timed out")
        } else if e.is_connect() {
            SignerError::new(ErrorCode::NetworkError, "Connection failed")
        } else if e.is_decode() {
            SignerError::new(ErrorCode::ParseError, e.to_string())
        } else {
            SignerError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}
