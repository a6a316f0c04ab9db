//! Treasure Tiles - session core for an on-chain tile wagering game
//!
//! A player selects tiles on a 5x5 board and wagers on them in one contract
//! call. The contract answers asynchronously with an outcome event carrying
//! a gem or mine for each selected tile. This crate owns the board, the
//! transaction lifecycle and the correlation of outcome events back to the
//! session that caused them; signing, ledger access and the event feed are
//! injected through the traits in [`common::traits`].

pub mod common;
pub mod config;
pub mod controller;
pub mod correlator;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod simulation;

pub use common::config::{generate_sample_config, ConfigLoader};
pub use common::traits::{LedgerClient, LedgerServices, OutcomeEventSource, TransactionSigner};
pub use common::types::{
    BetRequest, ConfirmationResult, ContractAddress, OutcomeEvent, Receipt, SessionNonce,
    SubmissionHandle, TileOutcome,
};
pub use config::GameConfig;
pub use controller::{GameSnapshot, SessionController};
pub use correlator::{OutcomeCorrelator, OutcomeSubscription, Settlement};
pub use errors::{ConfigurationError, FailureReason, GameError, TilesError, TilesResult};
pub use games::{BetSession, GridSnapshot, RevealState, SelectionState, StatusUpdate, TileGrid, TxStatus};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use simulation::SimulatedLedger;
