//! Error types for the Treasure Tiles session core
//!
//! Precondition failures are returned synchronously as [`GameError`] and never
//! change state. Lifecycle failures are carried inside the failed tracker
//! status as a [`FailureReason`].

use crate::common::types::SessionNonce;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root error type for all Treasure Tiles operations
#[derive(Debug)]
pub enum TilesError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Rejected game operations
    Game(GameError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    MissingRequired(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
    SaveFailed(String),
}

/// Synchronous rejections of grid and session operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Tile index {index} out of range (grid has {size} tiles)")]
    InvalidIndex { index: usize, size: usize },

    #[error("No tiles selected")]
    NoSelection,

    #[error("Invalid wager amount: {0}")]
    InvalidWager(f64),

    #[error("Session {0} is still in progress")]
    SessionActive(SessionNonce),

    #[error("Tile selection is frozen until the board is reset")]
    SelectionFrozen,

    #[error("Board still shows a finished game; reset before starting a new session")]
    BoardNotReset,

    #[error("Outcome carried {actual} results for {expected} selected tiles")]
    OutcomeMismatch { expected: usize, actual: usize },

    #[error("Tile {0} is already revealed")]
    AlreadyRevealed(usize),

    #[error("Illegal transaction transition from {from} to {to}")]
    IllegalTransition { from: &'static str, to: &'static str },
}

/// Why a session ended in the failed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Signer refused the request (declined, insufficient funds, ...)
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// Transaction reverted or was dropped before confirmation
    #[error("Confirmation failed: {0}")]
    ConfirmationFailed(String),

    #[error("No outcome event within {timeout_ms}ms")]
    OutcomeTimeout { timeout_ms: u64 },

    /// Contract and client disagree on the selection size
    #[error("Outcome carried {actual} results for {expected} selected tiles")]
    OutcomeMismatch { expected: usize, actual: usize },

    /// Outcome matched the selection size but the board refused it
    #[error("Outcome could not be applied to the board: {0}")]
    RevealRejected(String),

    #[error("Outcome event stream closed")]
    OutcomeStreamClosed,

    /// Listener fell behind the stream; the session's event may be among the lost ones
    #[error("Outcome event stream lagged; {skipped} events lost")]
    OutcomeStreamLagged { skipped: u64 },
}

impl fmt::Display for TilesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilesError::Configuration(e) => write!(f, "Configuration error: {}", e),
            TilesError::Game(e) => write!(f, "Game error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingRequired(field) => write!(f, "Missing required field: {}", field),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
            ConfigurationError::SaveFailed(msg) => write!(f, "Failed to save configuration: {}", msg),
        }
    }
}

impl std::error::Error for TilesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TilesError::Configuration(e) => Some(e),
            TilesError::Game(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigurationError {}

impl From<ConfigurationError> for TilesError {
    fn from(e: ConfigurationError) -> Self {
        TilesError::Configuration(e)
    }
}

impl From<GameError> for TilesError {
    fn from(e: GameError) -> Self {
        TilesError::Game(e)
    }
}

impl From<std::io::Error> for TilesError {
    fn from(e: std::io::Error) -> Self {
        TilesError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for TilesError {
    fn from(e: serde_json::Error) -> Self {
        TilesError::Configuration(ConfigurationError::SaveFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type TilesResult<T> = Result<T, TilesError>;
