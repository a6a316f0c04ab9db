//! Core types exchanged with the signer, the ledger and the outcome stream
//!
//! These types describe the outbound wager transaction and the inbound
//! outcome event. They are shared by the session core and every external
//! service implementation.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of tiles on the board
pub const DEFAULT_GRID_SIZE: usize = 25;

/// Wei in one ether
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Opaque token tying a submitted wager to its outcome event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionNonce(Uuid);

impl SessionNonce {
    /// Generate a fresh nonce; never reused across sessions
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Raw bytes as passed to the contract
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_bytes()))
    }
}

/// 20-byte address of the wagering contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress([u8; 20]);

impl ContractAddress {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for ContractAddress {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigurationError::InvalidValue {
            field: "contract.address".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| invalid("not a hex string"))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| invalid("expected 20 bytes"))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(address: ContractAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// What the contract revealed under one selected tile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TileOutcome {
    Mine,
    Gem,
}

impl fmt::Display for TileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileOutcome::Mine => write!(f, "mine"),
            TileOutcome::Gem => write!(f, "gem"),
        }
    }
}

/// Outbound wager transaction handed to the signer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetRequest {
    /// Target wagering contract
    pub contract: ContractAddress,
    pub chain_id: u64,
    /// Correlation token echoed back by the outcome event
    pub nonce: SessionNonce,
    /// Selected-count call parameter
    pub selected_count: u32,
    /// Wager amount call parameter
    pub wager_wei: u128,
    /// Value attached to the call
    pub value_wei: u128,
}

/// Acknowledgment that a transaction entered the network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub tx_hash: String,
}

/// Ledger receipt for a confirmed transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

/// Result of waiting on a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationResult {
    Confirmed(Receipt),
    /// Revert, drop or timeout, with the ledger's reason
    Failed(String),
}

/// Outcome notification emitted by the contract
///
/// `outcomes` follows the ascending order of the tiles selected when the
/// session was built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeEvent {
    pub nonce: SessionNonce,
    pub outcomes: Vec<TileOutcome>,
}

impl OutcomeEvent {
    pub fn new(nonce: SessionNonce, outcomes: Vec<TileOutcome>) -> Self {
        Self { nonce, outcomes }
    }

    pub fn mines(&self) -> usize {
        self.outcomes.iter().filter(|o| **o == TileOutcome::Mine).count()
    }
}
