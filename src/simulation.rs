//! In-memory ledger for the CLI and tests
//!
//! Plays all three external roles: accepts submissions, confirms them in
//! monotonically increasing blocks and publishes one outcome event per
//! confirmed wager. Faults can be injected to exercise every failure path.

use crate::common::traits::{LedgerClient, OutcomeEventSource, TransactionSigner};
use crate::common::types::{
    BetRequest, ConfirmationResult, OutcomeEvent, Receipt, SubmissionHandle, TileOutcome,
};
use crate::config::SimulationConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const SIMULATED_GAS_USED: u64 = 21_000;

#[derive(Debug, Default)]
struct Faults {
    reject: Option<String>,
    revert: Option<String>,
    withhold: bool,
    scripted: VecDeque<Vec<TileOutcome>>,
}

pub struct SimulatedLedger {
    config: SimulationConfig,
    events: broadcast::Sender<OutcomeEvent>,
    submissions: DashMap<String, BetRequest>,
    faults: Mutex<Faults>,
    tx_counter: AtomicU64,
    block_height: AtomicU64,
}

impl SimulatedLedger {
    pub fn new(config: SimulationConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            events,
            submissions: DashMap::new(),
            faults: Mutex::new(Faults::default()),
            tx_counter: AtomicU64::new(0),
            block_height: AtomicU64::new(1),
        }
    }

    /// Signer declines every following submission
    pub async fn reject_submissions(&self, reason: impl Into<String>) {
        self.faults.lock().await.reject = Some(reason.into());
    }

    /// Every following confirmation fails
    pub async fn revert_confirmations(&self, reason: impl Into<String>) {
        self.faults.lock().await.revert = Some(reason.into());
    }

    /// Confirm wagers without ever publishing their outcome
    pub async fn withhold_outcomes(&self, withhold: bool) {
        self.faults.lock().await.withhold = withhold;
    }

    /// Queue the outcome payload for the next confirmed wager
    pub async fn script_outcome(&self, outcomes: Vec<TileOutcome>) {
        self.faults.lock().await.scripted.push_back(outcomes);
    }

    pub async fn clear_faults(&self) {
        *self.faults.lock().await = Faults::default();
    }

    /// Publish an arbitrary event; returns how many listeners received it
    pub fn emit(&self, event: OutcomeEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn submitted(&self, tx_hash: &str) -> Option<BetRequest> {
        self.submissions.get(tx_hash).map(|entry| entry.value().clone())
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }

    pub fn block_height(&self) -> u64 {
        self.block_height.load(Ordering::SeqCst)
    }

    /// Independent draw per tile
    pub fn roll_outcomes(&self, count: usize) -> Vec<TileOutcome> {
        let probability = self.config.mine_probability.clamp(0.0, 1.0);
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| {
                if rng.gen_bool(probability) {
                    TileOutcome::Mine
                } else {
                    TileOutcome::Gem
                }
            })
            .collect()
    }

    fn schedule_outcome(&self, event: OutcomeEvent) {
        let events = self.events.clone();
        let delay = Duration::from_millis(self.config.outcome_delay_ms);
        tokio::spawn(async move {
            delay_for(delay).await;
            let nonce = event.nonce;
            if events.send(event).is_err() {
                debug!("Outcome for {} published with no listeners", nonce);
            }
        });
    }
}

async fn delay_for(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl TransactionSigner for SimulatedLedger {
    async fn submit(&self, request: &BetRequest) -> Result<SubmissionHandle, String> {
        delay_for(Duration::from_millis(self.config.submission_delay_ms)).await;

        if let Some(reason) = self.faults.lock().await.reject.clone() {
            info!("Rejecting wager {}: {}", request.nonce, reason);
            return Err(reason);
        }

        let id = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("0x{:064x}", id);
        self.submissions.insert(tx_hash.clone(), request.clone());
        debug!("Accepted wager {} as {}", request.nonce, tx_hash);

        Ok(SubmissionHandle { tx_hash })
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn await_confirmation(&self, handle: &SubmissionHandle) -> ConfirmationResult {
        delay_for(Duration::from_millis(self.config.confirmation_delay_ms)).await;

        let Some(request) = self.submitted(&handle.tx_hash) else {
            return ConfirmationResult::Failed(format!("unknown transaction {}", handle.tx_hash));
        };

        let (revert, withhold, scripted) = {
            let mut faults = self.faults.lock().await;
            let revert = faults.revert.clone();
            let scripted = if revert.is_none() { faults.scripted.pop_front() } else { None };
            (revert, faults.withhold, scripted)
        };

        if let Some(reason) = revert {
            info!("Reverting {}: {}", handle.tx_hash, reason);
            return ConfirmationResult::Failed(reason);
        }

        let block_number = self.block_height.fetch_add(1, Ordering::SeqCst);

        if withhold {
            debug!("Withholding outcome for {}", request.nonce);
        } else {
            let outcomes = scripted.unwrap_or_else(|| self.roll_outcomes(request.selected_count as usize));
            self.schedule_outcome(OutcomeEvent::new(request.nonce, outcomes));
        }

        ConfirmationResult::Confirmed(Receipt {
            tx_hash: handle.tx_hash.clone(),
            block_number,
            gas_used: Some(SIMULATED_GAS_USED),
        })
    }
}

impl OutcomeEventSource for SimulatedLedger {
    fn subscribe(&self) -> broadcast::Receiver<OutcomeEvent> {
        self.events.subscribe()
    }
}
