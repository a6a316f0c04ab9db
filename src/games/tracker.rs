//! Transaction lifecycle state machine
//!
//! ```text
//! Idle -> Built -> Submitted -> Pending -> Confirmed -> AwaitingOutcome -> Finalized
//!           \          \            \                        \
//!            +----------+------------+------------------------+--> Failed
//! ```
//!
//! Every accepted transition is published on the status channel. Terminal
//! states accept nothing further.

use crate::common::types::{Receipt, SessionNonce, SubmissionHandle};
use crate::errors::{FailureReason, GameError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Lifecycle status of a wager transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TxStatus {
    Idle,
    Built,
    Submitted,
    Pending,
    Confirmed,
    AwaitingOutcome,
    Finalized,
    Failed(FailureReason),
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Finalized | TxStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::Idle => "idle",
            TxStatus::Built => "built",
            TxStatus::Submitted => "submitted",
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::AwaitingOutcome => "awaiting_outcome",
            TxStatus::Finalized => "finalized",
            TxStatus::Failed(_) => "failed",
        }
    }

    /// Whether `next` directly follows this status
    pub fn can_transition_to(&self, next: &TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (Idle, Built)
                | (Built, Submitted)
                | (Submitted, Pending)
                | (Pending, Confirmed)
                | (Confirmed, AwaitingOutcome)
                | (AwaitingOutcome, Finalized)
                | (Built | Submitted | Pending | AwaitingOutcome, Failed(_))
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Failed(reason) => write!(f, "failed ({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Status change notification for observers
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub nonce: SessionNonce,
    pub status: TxStatus,
    pub at: DateTime<Utc>,
}

/// Drives one wager transaction through its lifecycle
#[derive(Debug)]
pub struct TransactionTracker {
    nonce: SessionNonce,
    status: TxStatus,
    submission: Option<SubmissionHandle>,
    receipt: Option<Receipt>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl TransactionTracker {
    /// New tracker in `Idle`
    pub fn new(nonce: SessionNonce, updates: broadcast::Sender<StatusUpdate>) -> Self {
        Self {
            nonce,
            status: TxStatus::Idle,
            submission: None,
            receipt: None,
            updates,
        }
    }

    pub fn nonce(&self) -> SessionNonce {
        self.nonce
    }

    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn submission(&self) -> Option<&SubmissionHandle> {
        self.submission.as_ref()
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    /// Move to `next` if the lifecycle allows it, then publish the change
    pub fn advance(&mut self, next: TxStatus) -> Result<&TxStatus, GameError> {
        if !self.status.can_transition_to(&next) {
            return Err(GameError::IllegalTransition {
                from: self.status.label(),
                to: next.label(),
            });
        }

        tracing::debug!("Session {}: {} -> {}", self.nonce, self.status.label(), next.label());
        self.status = next;

        // Nobody listening is fine; the status is still queryable
        let _ = self.updates.send(StatusUpdate {
            nonce: self.nonce,
            status: self.status.clone(),
            at: Utc::now(),
        });

        Ok(&self.status)
    }

    pub fn fail(&mut self, reason: FailureReason) -> Result<&TxStatus, GameError> {
        self.advance(TxStatus::Failed(reason))
    }

    /// Hand-off acknowledged by the signer
    pub fn record_submission(&mut self, handle: SubmissionHandle) -> Result<&TxStatus, GameError> {
        self.advance(TxStatus::Pending)?;
        self.submission = Some(handle);
        Ok(&self.status)
    }

    /// Ledger confirmed the wager; outcome correlation starts right away
    pub fn record_receipt(&mut self, receipt: Receipt) -> Result<&TxStatus, GameError> {
        self.advance(TxStatus::Confirmed)?;
        self.receipt = Some(receipt);
        self.advance(TxStatus::AwaitingOutcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (TransactionTracker, broadcast::Receiver<StatusUpdate>) {
        let (tx, rx) = broadcast::channel(16);
        (TransactionTracker::new(SessionNonce::generate(), tx), rx)
    }

    fn receipt() -> Receipt {
        Receipt {
            tx_hash: "0xabc".to_string(),
            block_number: 7,
            gas_used: Some(21000),
        }
    }

    #[test]
    fn test_happy_path_is_published_in_order() {
        let (mut tracker, mut rx) = tracker();

        tracker.advance(TxStatus::Built).unwrap();
        tracker.advance(TxStatus::Submitted).unwrap();
        tracker
            .record_submission(SubmissionHandle { tx_hash: "0xabc".to_string() })
            .unwrap();
        tracker.record_receipt(receipt()).unwrap();
        tracker.advance(TxStatus::Finalized).unwrap();

        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.nonce, tracker.nonce());
            seen.push(update.status);
        }
        assert_eq!(
            seen,
            vec![
                TxStatus::Built,
                TxStatus::Submitted,
                TxStatus::Pending,
                TxStatus::Confirmed,
                TxStatus::AwaitingOutcome,
                TxStatus::Finalized,
            ]
        );
        assert_eq!(tracker.receipt().unwrap().block_number, 7);
        assert!(tracker.is_terminal());
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let (mut tracker, _rx) = tracker();

        let err = tracker.advance(TxStatus::Submitted).unwrap_err();
        assert_eq!(err, GameError::IllegalTransition { from: "idle", to: "submitted" });

        tracker.advance(TxStatus::Built).unwrap();
        assert!(tracker.advance(TxStatus::Confirmed).is_err());
        assert_eq!(tracker.status(), &TxStatus::Built);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let (mut tracker, _rx) = tracker();
        tracker.advance(TxStatus::Built).unwrap();
        tracker.advance(TxStatus::Submitted).unwrap();
        tracker
            .fail(FailureReason::SubmissionRejected("user declined".to_string()))
            .unwrap();

        assert!(tracker.is_terminal());
        assert!(tracker.advance(TxStatus::Pending).is_err());
        assert!(tracker.fail(FailureReason::OutcomeStreamClosed).is_err());
        assert_eq!(
            tracker.status(),
            &TxStatus::Failed(FailureReason::SubmissionRejected("user declined".to_string()))
        );
    }

    #[test]
    fn test_failure_sources() {
        let failed = TxStatus::Failed(FailureReason::OutcomeStreamClosed);
        assert!(!TxStatus::Idle.can_transition_to(&failed));
        assert!(TxStatus::Built.can_transition_to(&failed));
        assert!(TxStatus::Pending.can_transition_to(&failed));
        assert!(!TxStatus::Confirmed.can_transition_to(&failed));
        assert!(TxStatus::AwaitingOutcome.can_transition_to(&failed));
        assert!(!TxStatus::Finalized.can_transition_to(&failed));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(TxStatus::AwaitingOutcome).unwrap();
        assert_eq!(json["status"], "awaiting_outcome");

        let failed = TxStatus::Failed(FailureReason::ConfirmationFailed("reverted".to_string()));
        assert_eq!(failed.to_string(), "failed (Confirmation failed: reverted)");
    }
}
