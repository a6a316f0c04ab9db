//! External collaborators of the session core
//!
//! The signer, the ledger and the outcome stream are injected into the
//! controller as trait objects, so the core can run against a real chain
//! client or the in-memory simulation alike.

use crate::common::types::{BetRequest, ConfirmationResult, OutcomeEvent, SubmissionHandle};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Signs and submits a wager transaction
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Hand the request to the signer; returns once it entered the network,
    /// or the rejection reason (declined, insufficient funds, ...)
    async fn submit(&self, request: &BetRequest) -> Result<SubmissionHandle, String>;
}

/// Waits for ledger inclusion of a submitted transaction
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn await_confirmation(&self, handle: &SubmissionHandle) -> ConfirmationResult;
}

/// Subscribable feed of contract outcome events
pub trait OutcomeEventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<OutcomeEvent>;
}

/// The three external services a controller talks to
#[derive(Clone)]
pub struct LedgerServices {
    pub signer: Arc<dyn TransactionSigner>,
    pub ledger: Arc<dyn LedgerClient>,
    pub events: Arc<dyn OutcomeEventSource>,
}

impl LedgerServices {
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        ledger: Arc<dyn LedgerClient>,
        events: Arc<dyn OutcomeEventSource>,
    ) -> Self {
        Self { signer, ledger, events }
    }

    /// Use one client for all three roles
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: TransactionSigner + LedgerClient + OutcomeEventSource + 'static,
    {
        Self {
            signer: client.clone(),
            ledger: client.clone(),
            events: client,
        }
    }
}
