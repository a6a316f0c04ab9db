//! Configuration loading for the Treasure Tiles client
//!
//! Reads an optional TOML file, applies `TILES_*` environment overrides and
//! validates the result.

use crate::config::GameConfig;
use crate::errors::{ConfigurationError, TilesResult};
use std::env;
use std::path::Path;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> TilesResult<GameConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            GameConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> TilesResult<GameConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut GameConfig) -> TilesResult<()> {
        if let Ok(address) = env::var("TILES_CONTRACT_ADDRESS") {
            config.contract.address = address.parse()?;
        }
        if let Ok(chain) = env::var("TILES_CHAIN") {
            config.contract.chain = chain;
        }
        if let Ok(chain_id) = env::var("TILES_CHAIN_ID") {
            config.contract.chain_id = chain_id.parse()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "TILES_CHAIN_ID".to_string(),
                    value: chain_id,
                    reason: "Invalid chain id".to_string(),
                })?;
        }
        if let Ok(timeout) = env::var("TILES_OUTCOME_TIMEOUT_MS") {
            config.session.outcome_timeout_ms = Some(timeout.parse()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "TILES_OUTCOME_TIMEOUT_MS".to_string(),
                    value: timeout,
                    reason: "Invalid timeout value".to_string(),
                })?);
        }
        if let Ok(probability) = env::var("TILES_MINE_PROBABILITY") {
            config.simulation.mine_probability = probability.parse()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "TILES_MINE_PROBABILITY".to_string(),
                    value: probability,
                    reason: "Invalid probability".to_string(),
                })?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &GameConfig) -> TilesResult<()> {
        if config.contract.chain.is_empty() {
            return Err(ConfigurationError::MissingRequired("contract.chain".to_string()).into());
        }

        if config.session.grid_size == 0 || config.session.grid_size > u8::MAX as usize {
            return Err(ConfigurationError::InvalidValue {
                field: "session.grid_size".to_string(),
                value: config.session.grid_size.to_string(),
                reason: "Grid must hold between 1 and 255 tiles".to_string(),
            }.into());
        }

        if config.session.outcome_timeout_ms == Some(0) {
            return Err(ConfigurationError::InvalidValue {
                field: "session.outcome_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "Timeout cannot be zero; leave it unset to wait indefinitely".to_string(),
            }.into());
        }

        if config.session.update_channel_capacity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "session.update_channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "Channel capacity cannot be zero".to_string(),
            }.into());
        }

        let probability = config.simulation.mine_probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigurationError::InvalidValue {
                field: "simulation.mine_probability".to_string(),
                value: probability.to_string(),
                reason: "Probability must be within 0.0..=1.0".to_string(),
            }.into());
        }

        if config.simulation.event_channel_capacity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "simulation.event_channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "Channel capacity cannot be zero".to_string(),
            }.into());
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &GameConfig, path: &str) -> TilesResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> TilesResult<()> {
    let config = GameConfig::default();
    ConfigLoader::new().save(&config, path)
}
