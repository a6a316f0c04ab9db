//! Configuration with defaults for the Treasure Tiles client
//!
//! Defaults target the Sepolia deployment of the wagering contract.

use crate::common::types::{ContractAddress, DEFAULT_GRID_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sepolia deployment of the wagering contract
pub const DEFAULT_CONTRACT_ADDRESS: ContractAddress = ContractAddress::new([
    0xda, 0xe9, 0x79, 0x00, 0xd4, 0xb1, 0x84, 0xc5, 0xd2, 0x01, 0x2d, 0xcd, 0xb6, 0x58, 0xc0, 0x08,
    0x96, 0x64, 0x66, 0xdd,
]);

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Top-level client configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub contract: ContractConfig,
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
}

/// Where wagers are sent
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub address: ContractAddress,
    pub chain: String,
    pub chain_id: u64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_CONTRACT_ADDRESS,
            chain: "sepolia".to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
        }
    }
}

/// Session behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub grid_size: usize,
    /// Fail a session that waits longer than this for its outcome; unset waits forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_timeout_ms: Option<u64>,
    /// Buffered status updates per subscriber
    pub update_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            outcome_timeout_ms: None,
            update_channel_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn outcome_timeout(&self) -> Option<Duration> {
        self.outcome_timeout_ms.map(Duration::from_millis)
    }
}

/// In-memory ledger used by the CLI and tests
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Chance that any selected tile hides a mine
    pub mine_probability: f64,
    pub submission_delay_ms: u64,
    pub confirmation_delay_ms: u64,
    pub outcome_delay_ms: u64,
    pub event_channel_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mine_probability: 1.0 / 25.0,
            submission_delay_ms: 150,
            confirmation_delay_ms: 400,
            outcome_delay_ms: 250,
            event_channel_capacity: 256,
        }
    }
}

impl GameConfig {
    /// Configuration for tests: no simulated latency
    pub fn testing() -> Self {
        Self {
            simulation: SimulationConfig {
                submission_delay_ms: 0,
                confirmation_delay_ms: 0,
                outcome_delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
