//! Bet session: a frozen selection plus wager, packaged as one transaction

use crate::common::types::{BetRequest, SessionNonce, WEI_PER_ETHER};
use crate::config::ContractConfig;
use crate::errors::GameError;
use crate::games::grid::TileGrid;
use crate::games::tracker::{StatusUpdate, TransactionTracker, TxStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Convert a wager in ether to wei, rejecting anything that is not a positive amount
pub fn wager_to_wei(wager: f64) -> Result<u128, GameError> {
    if !wager.is_finite() || wager <= 0.0 {
        return Err(GameError::InvalidWager(wager));
    }

    let wei = (wager * WEI_PER_ETHER as f64).round();
    if wei < 1.0 || wei >= u128::MAX as f64 {
        return Err(GameError::InvalidWager(wager));
    }
    Ok(wei as u128)
}

/// One wager on one selection
#[derive(Debug)]
pub struct BetSession {
    nonce: SessionNonce,
    wager: f64,
    selection: Vec<usize>,
    request: BetRequest,
    tracker: TransactionTracker,
    started_at: DateTime<Utc>,
}

impl BetSession {
    /// Validate the grid selection and wager, then build the request
    ///
    /// On success the tracker has moved `Idle -> Built` and a fresh nonce is
    /// assigned. On failure nothing is published and the grid is untouched.
    pub fn build(
        grid: &TileGrid,
        wager: f64,
        contract: &ContractConfig,
        updates: broadcast::Sender<StatusUpdate>,
    ) -> Result<Self, GameError> {
        let selection = grid.selected_indices();
        if selection.is_empty() {
            return Err(GameError::NoSelection);
        }
        let wager_wei = wager_to_wei(wager)?;

        let nonce = SessionNonce::generate();
        let request = BetRequest {
            contract: contract.address,
            chain_id: contract.chain_id,
            nonce,
            // grid size is validated to fit in u8
            selected_count: selection.len() as u32,
            wager_wei,
            value_wei: wager_wei,
        };

        let mut tracker = TransactionTracker::new(nonce, updates);
        tracker.advance(TxStatus::Built)?;

        Ok(Self {
            nonce,
            wager,
            selection,
            request,
            tracker,
            started_at: Utc::now(),
        })
    }

    pub fn nonce(&self) -> SessionNonce {
        self.nonce
    }

    pub fn wager(&self) -> f64 {
        self.wager
    }

    /// Selection snapshot taken at build time, ascending
    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    pub fn request(&self) -> &BetRequest {
        &self.request
    }

    pub fn status(&self) -> &TxStatus {
        self.tracker.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.tracker.is_terminal()
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TransactionTracker {
        &mut self.tracker
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            nonce: self.nonce,
            wager: self.wager,
            wager_wei: self.request.wager_wei.to_string(),
            selection: self.selection.clone(),
            status: self.tracker.status().clone(),
            tx_hash: self.tracker.submission().map(|h| h.tx_hash.clone()),
            block_number: self.tracker.receipt().map(|r| r.block_number),
            started_at: self.started_at,
        }
    }
}

/// Serializable summary of a session for the UI
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub nonce: SessionNonce,
    pub wager: f64,
    /// Decimal string; JSON numbers cannot carry u128
    pub wager_wei: String,
    pub selection: Vec<usize>,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub started_at: DateTime<Utc>,
}
