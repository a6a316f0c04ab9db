//! Session controller
//!
//! Single entry point for the UI. Owns the board and at most one bet session,
//! and drives the session's transaction through the injected signer, ledger
//! and outcome stream on a background task. Callers get control back as soon
//! as the session is built; progress arrives on the status channel.

use crate::common::traits::LedgerServices;
use crate::common::types::{BetRequest, ConfirmationResult, OutcomeEvent, SessionNonce};
use crate::config::GameConfig;
use crate::correlator::{self, OutcomeCorrelator, OutcomeSubscription, Settlement};
use crate::errors::{FailureReason, GameError};
use crate::games::grid::TileGrid;
use crate::games::session::{BetSession, SessionView};
use crate::games::tracker::{StatusUpdate, TransactionTracker, TxStatus};
use crate::games::types::{GridSnapshot, SelectionState};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

struct SessionState {
    grid: TileGrid,
    /// Live or most recent session; cleared by reset
    session: Option<BetSession>,
}

/// Board and session as the UI renders them
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub grid: GridSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

/// Orchestrates the board, the bet session and the external services
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    services: LedgerServices,
    correlator: OutcomeCorrelator,
    updates: broadcast::Sender<StatusUpdate>,
    config: Arc<GameConfig>,
    metrics: SessionMetrics,
}

impl SessionController {
    /// Create a controller with a blank board
    ///
    /// Must be called inside a tokio runtime; the outcome stream is subscribed
    /// immediately.
    pub fn new(config: GameConfig, services: LedgerServices) -> Self {
        let metrics = SessionMetrics::new();
        let correlator = OutcomeCorrelator::new(services.events.subscribe(), metrics.clone());
        let (updates, _) = broadcast::channel(config.session.update_channel_capacity);

        Self {
            state: Arc::new(Mutex::new(SessionState {
                grid: TileGrid::new(config.session.grid_size),
                session: None,
            })),
            services,
            correlator,
            updates,
            config: Arc::new(config),
            metrics,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn correlator(&self) -> &OutcomeCorrelator {
        &self.correlator
    }

    /// Status changes of every session, in transition order
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    pub async fn toggle_selection(&self, index: usize) -> Result<SelectionState, GameError> {
        let mut state = self.state.lock().await;
        state.grid.toggle_selection(index)
    }

    pub async fn selected_indices(&self) -> Vec<usize> {
        self.state.lock().await.grid.selected_indices()
    }

    /// Status of the current session, `Idle` when there is none
    pub async fn status(&self) -> TxStatus {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|s| s.status().clone())
            .unwrap_or(TxStatus::Idle)
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        let state = self.state.lock().await;
        GameSnapshot {
            grid: state.grid.snapshot(),
            session: state.session.as_ref().map(BetSession::view),
        }
    }

    /// Build a session from the current selection and submit it
    ///
    /// Returns the session nonce once the request is built; submission,
    /// confirmation and outcome correlation continue in the background.
    pub async fn start_session(&self, wager: f64) -> Result<SessionNonce, GameError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match &state.session {
            Some(session) if !session.is_terminal() => {
                return Err(GameError::SessionActive(session.nonce()));
            }
            Some(session) if *session.status() == TxStatus::Finalized => {
                return Err(GameError::BoardNotReset);
            }
            _ => {}
        }

        let session = BetSession::build(&state.grid, wager, &self.config.contract, self.updates.clone())?;
        let nonce = session.nonce();
        let request = session.request().clone();

        state.grid.freeze();
        state.session = Some(session);
        self.metrics.record_started();
        info!(
            "Session {} started: {} tiles, wager {} ({} wei)",
            nonce, request.selected_count, wager, request.wager_wei
        );

        // Armed before the hand-off so an outcome landing with the receipt is not lost
        let subscription = self.correlator.subscribe(nonce);
        drop(guard);

        tokio::spawn(self.clone().drive(request, subscription));
        Ok(nonce)
    }

    /// Clear the session and the board together
    pub async fn reset(&self) -> Result<(), GameError> {
        let mut state = self.state.lock().await;

        if let Some(session) = &state.session {
            if !session.is_terminal() {
                return Err(GameError::SessionActive(session.nonce()));
            }
            self.correlator.unsubscribe(&session.nonce());
        }

        state.session = None;
        state.grid.reset();
        info!("Board reset");
        Ok(())
    }

    /// Wait until the session reaches a terminal status
    ///
    /// Returns `None` if the session is no longer the controller's session.
    pub async fn wait_until_settled(&self, nonce: SessionNonce) -> Option<TxStatus> {
        let mut rx = self.updates.subscribe();
        loop {
            let status = self.session_status(nonce).await?;
            if status.is_terminal() {
                return Some(status);
            }
            if let Err(broadcast::error::RecvError::Closed) = rx.recv().await {
                return Some(status);
            }
        }
    }

    async fn session_status(&self, nonce: SessionNonce) -> Option<TxStatus> {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .filter(|s| s.nonce() == nonce)
            .map(|s| s.status().clone())
    }

    /// Background lifecycle of one session; every step re-checks that the
    /// session is still live before touching it
    async fn drive(self, request: BetRequest, mut subscription: OutcomeSubscription) {
        let nonce = request.nonce;

        if !self.step(nonce, |t| t.advance(TxStatus::Submitted).map(|_| ())).await {
            return;
        }

        let handle = match self.services.signer.submit(&request).await {
            Ok(handle) => handle,
            Err(reason) => {
                drop(subscription);
                self.fail(nonce, FailureReason::SubmissionRejected(reason)).await;
                return;
            }
        };
        debug!("Session {} broadcast as {}", nonce, handle.tx_hash);
        if !self.step(nonce, |t| t.record_submission(handle.clone()).map(|_| ())).await {
            return;
        }

        match self.services.ledger.await_confirmation(&handle).await {
            ConfirmationResult::Confirmed(receipt) => {
                debug!("Session {} confirmed in block {}", nonce, receipt.block_number);
                if !self.step(nonce, |t| t.record_receipt(receipt).map(|_| ())).await {
                    return;
                }
            }
            ConfirmationResult::Failed(reason) => {
                drop(subscription);
                self.fail(nonce, FailureReason::ConfirmationFailed(reason)).await;
                return;
            }
        }

        let outcome = subscription.wait(self.config.session.outcome_timeout()).await;
        // Stop listening before the session turns terminal
        drop(subscription);

        match outcome {
            Ok(event) => self.settle(event).await,
            Err(reason) => self.fail(nonce, reason).await,
        }
    }

    async fn step<F>(&self, nonce: SessionNonce, apply: F) -> bool
    where
        F: FnOnce(&mut TransactionTracker) -> Result<(), GameError>,
    {
        let mut state = self.state.lock().await;
        match state.session.as_mut() {
            Some(session) if session.nonce() == nonce && !session.is_terminal() => {
                match apply(session.tracker_mut()) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Session {}: {}", nonce, e);
                        false
                    }
                }
            }
            _ => {
                debug!("Session {} is no longer live; dropping transition", nonce);
                false
            }
        }
    }

    async fn fail(&self, nonce: SessionNonce, reason: FailureReason) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(session) = state.session.as_mut().filter(|s| s.nonce() == nonce) else {
            debug!("Session {} is no longer live; dropping failure {}", nonce, reason);
            return;
        };

        match session.tracker_mut().fail(reason.clone()) {
            Ok(_) => {
                state.grid.thaw();
                self.metrics.record_failed();
                warn!("Session {} failed: {}", nonce, reason);
            }
            Err(e) => warn!("Session {}: {}", nonce, e),
        }
    }

    async fn settle(&self, event: OutcomeEvent) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(session) = state.session.as_mut() else {
            debug!("No session for outcome {}", event.nonce);
            return;
        };

        match correlator::settle(session, &mut state.grid, &event) {
            Settlement::Finalized { gems, mines } => {
                self.metrics.record_finalized(gems as u64, mines as u64);
                info!("Session {} finalized: {} gems, {} mines", event.nonce, gems, mines);
            }
            Settlement::Failed(_) => {
                state.grid.thaw();
                self.metrics.record_failed();
            }
            Settlement::Ignored => {}
        }
    }
}
