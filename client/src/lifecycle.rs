//! Transaction Lifecycle
//!
//! Drives one account's submissions through
//! `Idle → Submitting → PendingConfirmation → {Confirmed, Failed}`.
//!
//! The state lives in a `tokio::sync::watch` channel owned by the
//! [`TransactionSubmitter`]; observers subscribe to it and never mutate it.
//! Workflow progress is reported as [`LifecycleEvent`]s over an optional
//! `mpsc` channel.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::account::{AccountSession, ReceiptStatus, TxHash};
use crate::errors::{ClientError, ClientResult};
use crate::transaction::{Operation, TransactionRequest};

/// Transaction status in the lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Nothing in flight
    #[default]
    Idle,
    /// Handed to the account, not yet accepted
    Submitting,
    /// Accepted with a hash, waiting for the receipt
    PendingConfirmation,
    /// Receipt confirmed
    Confirmed,
    /// Rejected, reverted or otherwise failed
    Failed,
}

impl TransactionStatus {
    /// Whether a submission is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Submitting | TransactionStatus::PendingConfirmation
        )
    }
}

/// Observable state of the account's current transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub status: TransactionStatus,
    /// Present once the ledger accepted the transaction
    pub hash: Option<TxHash>,
    /// Present only when `status` is `Failed`
    pub error: Option<String>,
    /// Operation of the last submission
    pub operation: Option<Operation>,
}

impl TransactionState {
    pub fn is_loading(&self) -> bool {
        self.status.is_busy()
    }

    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }

    fn submitting(operation: Operation) -> Self {
        Self {
            status: TransactionStatus::Submitting,
            hash: None,
            error: None,
            operation: Some(operation),
        }
    }
}

/// Steps of a confidential submission, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStep {
    /// Check plaintext arguments
    Collect,
    /// Encrypt sensitive fields
    Encrypt,
    /// Validate proofs locally
    Prove,
    /// Hand the call to the account
    Submit,
    /// Wait for the receipt
    Confirm,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 5] = [
        WorkflowStep::Collect,
        WorkflowStep::Encrypt,
        WorkflowStep::Prove,
        WorkflowStep::Submit,
        WorkflowStep::Confirm,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Processing,
    Completed,
    Failed,
}

/// Progress notification for one workflow step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub operation: Operation,
    pub step: WorkflowStep,
    pub status: StepStatus,
}

/// Optional sender for lifecycle events
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    event_tx: Option<mpsc::Sender<LifecycleEvent>>,
}

impl EventSink {
    pub fn new(event_tx: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            event_tx: Some(event_tx),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Deliver an event without waiting. A full channel drops the event, so
    /// a slow observer never holds up a submission.
    pub(crate) fn emit(&self, operation: Operation, step: WorkflowStep, status: StepStatus) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        let event = LifecycleEvent {
            operation,
            step,
            status,
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%operation, ?step, ?status, "lifecycle event channel full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(%operation, ?step, "lifecycle event receiver dropped");
            }
        }
    }
}

/// Owns the transaction state of one account and drives submissions
pub struct TransactionSubmitter {
    account: Arc<dyn AccountSession>,
    state: Arc<watch::Sender<TransactionState>>,
    events: EventSink,
}

impl TransactionSubmitter {
    pub fn new(account: Arc<dyn AccountSession>) -> Self {
        let (state, _) = watch::channel(TransactionState::default());
        Self {
            account,
            state: Arc::new(state),
            events: EventSink::disabled(),
        }
    }

    /// Report workflow progress to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> TransactionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().status.is_busy()
    }

    /// Submit `request` and wait up to `timeout` for its receipt.
    ///
    /// Returns the resulting state. A timeout is not an error: the state stays
    /// `PendingConfirmation` and [`TransactionSubmitter::wait_for_confirmation`]
    /// can resume waiting. Submission while another transaction is in flight
    /// fails with `ConcurrentSubmission` and leaves the state untouched.
    ///
    /// The hand-off to the account runs on its own task. Dropping this future
    /// while the account is answering keeps the state `Submitting` until the
    /// answer arrives, so the call cannot be broadcast twice.
    pub async fn submit(
        &self,
        request: TransactionRequest,
        timeout: Duration,
    ) -> ClientResult<TransactionState> {
        let operation = request.operation();
        if !self.account.is_connected().await {
            return Err(ClientError::Account("account not connected".into()));
        }
        self.begin(operation)?;
        self.events
            .emit(operation, WorkflowStep::Submit, StepStatus::Processing);

        let handoff = tokio::spawn(hand_off(
            Arc::clone(&self.account),
            Arc::clone(&self.state),
            self.events.clone(),
            request,
        ));
        let hash = match handoff.await {
            Ok(accepted) => accepted?,
            Err(err) => {
                tracing::error!(%operation, error = %err, "submission task failed");
                let err = ClientError::Submission(format!("submission task failed: {}", err));
                fail(&self.state, err.to_string());
                return Err(err);
            }
        };

        self.confirm(operation, hash, timeout).await
    }

    /// Keep waiting for the receipt of a transaction left pending by an
    /// earlier timeout. Any other state is returned unchanged.
    pub async fn wait_for_confirmation(&self, timeout: Duration) -> ClientResult<TransactionState> {
        let current = self.state();
        match (current.status, current.hash, current.operation) {
            (TransactionStatus::PendingConfirmation, Some(hash), Some(operation)) => {
                self.confirm(operation, hash, timeout).await
            }
            _ => Ok(current),
        }
    }

    /// Return a resting `Confirmed` or `Failed` state to `Idle`
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.status.is_busy() || state.status == TransactionStatus::Idle {
                return false;
            }
            *state = TransactionState::default();
            true
        })
    }

    /// Atomically move a resting state to `Submitting`
    fn begin(&self, operation: Operation) -> ClientResult<()> {
        let started = self.state.send_if_modified(|state| {
            if state.status.is_busy() {
                return false;
            }
            *state = TransactionState::submitting(operation);
            true
        });
        if started {
            tracing::debug!(%operation, "submitting");
            Ok(())
        } else {
            tracing::debug!(%operation, "rejected concurrent submission");
            Err(ClientError::ConcurrentSubmission)
        }
    }

    async fn confirm(
        &self,
        operation: Operation,
        hash: TxHash,
        timeout: Duration,
    ) -> ClientResult<TransactionState> {
        self.events
            .emit(operation, WorkflowStep::Confirm, StepStatus::Processing);
        match self.account.await_receipt(&hash, timeout).await {
            Ok(ReceiptStatus::Confirmed) => {
                self.state.send_modify(|state| {
                    state.status = TransactionStatus::Confirmed;
                    state.error = None;
                });
                tracing::info!(%operation, %hash, "transaction confirmed");
                self.events
                    .emit(operation, WorkflowStep::Confirm, StepStatus::Completed);
            }
            Ok(ReceiptStatus::Reverted { reason }) => {
                tracing::warn!(%operation, %hash, %reason, "transaction reverted");
                fail(&self.state, format!("transaction reverted: {}", reason));
                self.events
                    .emit(operation, WorkflowStep::Confirm, StepStatus::Failed);
            }
            Ok(ReceiptStatus::Pending) => {
                tracing::info!(%operation, %hash, ?timeout, "still pending after timeout");
            }
            Err(err) => {
                tracing::warn!(%operation, %hash, error = %err, "receipt unavailable");
                fail(&self.state, err.to_string());
                self.events
                    .emit(operation, WorkflowStep::Confirm, StepStatus::Failed);
            }
        }
        Ok(self.state())
    }
}

/// Hand the call to the account and record the outcome
async fn hand_off(
    account: Arc<dyn AccountSession>,
    state: Arc<watch::Sender<TransactionState>>,
    events: EventSink,
    request: TransactionRequest,
) -> ClientResult<TxHash> {
    let operation = request.operation();
    match account.submit(request.call()).await {
        Ok(hash) => {
            state.send_modify(|state| {
                state.status = TransactionStatus::PendingConfirmation;
                state.hash = Some(hash);
            });
            tracing::info!(%operation, %hash, "transaction accepted");
            events.emit(operation, WorkflowStep::Submit, StepStatus::Completed);
            Ok(hash)
        }
        Err(err) => {
            tracing::warn!(%operation, error = %err, "submission rejected");
            fail(&state, err.to_string());
            events.emit(operation, WorkflowStep::Submit, StepStatus::Failed);
            Err(match err {
                ClientError::Account(_) | ClientError::Submission(_) => err,
                other => ClientError::Submission(other.to_string()),
            })
        }
    }
}

fn fail(state: &watch::Sender<TransactionState>, error: String) {
    state.send_modify(|state| {
        state.status = TransactionStatus::Failed;
        state.error = Some(error);
    });
}
