//! Signing Coordinator
//!
//! Drives one quorum signing round: submit the digest, then poll the
//! operation until the quorum completes it. The poll loop suspends the task
//! between polls and can be bounded by a deadline or a cancellation switch.
//! Neither revokes the operation on the custody side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CustodyApi, SignRequestBody};
use crate::error::{ErrorCode, SignerError, SignerResult};
use crate::types::{OperationStatus, SignOperation, SignRequest};
use crate::utils::{is_cancelled, or_cancel, sleep_or_cancel, CancelSignal};
use crate::{log_debug, log_info, log_warn};

/// Default delay between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polling behaviour for `await_completion`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Upper bound on the whole wait; `None` waits indefinitely
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

pub struct SigningCoordinator {
    custody: Arc<dyn CustodyApi>,
    poll: PollConfig,
}

impl SigningCoordinator {
    pub fn new(custody: Arc<dyn CustodyApi>, poll: PollConfig) -> Self {
        Self { custody, poll }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Submit a sign request. A single attempt; any failure is reported as
    /// `SigningRequestFailed` with the service's message in the details.
    pub async fn request_signature(&self, vault_id: &str, request: &SignRequest) -> SignerResult<String> {
        let body = SignRequestBody::from(request);

        log_info!(
            "coordinator",
            "Requesting quorum signature",
            vault_id = vault_id,
            hash_to_sign = hex::encode(request.hash_to_sign),
        );

        let operation_id = self
            .custody
            .request_signature(vault_id, &body)
            .await
            .map_err(|e| e.recode(ErrorCode::SigningRequestFailed, "Sign request was not accepted"))?;

        if operation_id.trim().is_empty() {
            return Err(SignerError::signing_request_failed(
                "Custody service returned an empty operation id",
            ));
        }

        log_info!(
            "coordinator",
            "Signature process started, waiting for quorum approval",
            operation_id = operation_id,
        );
        Ok(operation_id)
    }

    /// Poll until the operation is `COMPLETED`.
    ///
    /// The first poll happens immediately. Failed polls are logged and
    /// retried on the next tick. A known failure status ends the wait with
    /// `SigningOperationFailed`.
    pub async fn await_completion(
        &self,
        operation_id: &str,
        mut cancel: Option<CancelSignal>,
    ) -> SignerResult<SignOperation> {
        let started = Instant::now();
        let mut attempt: u64 = 0;

        loop {
            if is_cancelled(&cancel) {
                return Err(aborted(operation_id));
            }

            attempt += 1;
            let polled = or_cancel(self.custody.get_sign_operation(operation_id), &mut cancel).await;
            let Some(polled) = polled else {
                return Err(aborted(operation_id));
            };
            match polled {
                Ok(op) => match &op.status {
                    OperationStatus::Completed => {
                        log_info!(
                            "coordinator",
                            "Quorum signature completed",
                            operation_id = operation_id,
                            polls = attempt,
                        );
                        return Ok(op);
                    }
                    OperationStatus::Failed(status) => {
                        return Err(SignerError::signing_operation_failed(format!(
                            "Signing operation {} ended with status {}",
                            operation_id, status
                        )));
                    }
                    status => {
                        log_debug!(
                            "coordinator",
                            "Signing operation still in progress",
                            operation_id = operation_id,
                            status = status,
                            attempt = attempt,
                        );
                    }
                },
                Err(e) => {
                    log_warn!(
                        "coordinator",
                        "Polling sign operation failed, retrying",
                        operation_id = operation_id,
                        attempt = attempt,
                        error = e,
                    );
                }
            }

            let wait = match self.poll.max_wait {
                Some(max_wait) => {
                    let elapsed = started.elapsed();
                    if elapsed >= max_wait {
                        return Err(SignerError::signing_timed_out(format!(
                            "Signing operation {} not completed after {:?}",
                            operation_id, max_wait
                        ))
                        .with_details(format!("polls={}", attempt)));
                    }
                    self.poll.interval.min(max_wait - elapsed)
                }
                None => self.poll.interval,
            };

            if sleep_or_cancel(wait, &mut cancel).await {
                return Err(aborted(operation_id));
            }
        }
    }

    /// Submit and wait in one step. Returns the operation id with the
    /// completed operation.
    pub async fn sign(
        &self,
        vault_id: &str,
        request: &SignRequest,
        cancel: Option<CancelSignal>,
    ) -> SignerResult<(String, SignOperation)> {
        let operation_id = self.request_signature(vault_id, request).await?;
        let op = self.await_completion(&operation_id, cancel).await?;
        Ok((operation_id, op))
    }
}

fn aborted(operation_id: &str) -> SignerError {
    SignerError::signing_aborted(format!(
        "Stopped waiting for signing operation {}",
        operation_id
    ))
    .with_details("the remote operation was not revoked")
}
