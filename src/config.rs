// Configuration management for the grid trading bot

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Simulation,
    Live,
}

/// What to do when some (but not all) grid levels fail to place on startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationPolicy {
    /// Cancel everything already placed and exit
    Abort,
    /// Keep the healthy levels running and retry the rest each tick
    Degrade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub pair: String,
    pub mode: TradingMode,
    /// Quote-currency capital allocated to the grid
    pub investment: f64,
    pub grid_count: usize,
    /// Total grid width as a percentage of the reference price (±range/2)
    pub range_percent: f64,
    pub poll_interval_secs: f64,
    pub max_order_retries: u32,
    pub on_activation_failure: ActivationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop-loss trigger as a percentage below the reference price
    pub stop_loss_percent: f64,
    /// Market-sell accumulated inventory when the grid is liquidated
    pub sell_inventory_on_liquidate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Synthetic price at which the random walk starts
    pub start_price: f64,
    /// Maximum per-tick price move as a percentage
    pub walk_step_pct: f64,
    /// Seed for a reproducible walk; omit for entropy
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig {
                pair: "BTC/EUR".to_string(),
                mode: TradingMode::Simulation,
                investment: 1000.0,
                grid_count: 20,
                range_percent: 10.0,
                poll_interval_secs: 5.0,
                max_order_retries: 5,
                on_activation_failure: ActivationPolicy::Degrade,
            },
            risk: RiskConfig {
                stop_loss_percent: 15.0,
                sell_inventory_on_liquidate: true,
            },
            simulation: SimulationConfig {
                start_price: 100.0,
                walk_step_pct: 0.5,
                seed: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.pair.split('/').count() != 2 {
            return Err(ConfigError::Validation(
                "pair must be in BASE/QUOTE form, e.g. BTC/EUR".to_string(),
            ));
        }

        if self.trading.investment <= 0.0 {
            return Err(ConfigError::Validation("investment must be positive".to_string()));
        }

        if self.trading.grid_count < 2 {
            return Err(ConfigError::Validation(
                "grid_count must be at least 2 (one buy and one sell level)".to_string(),
            ));
        }

        if self.trading.range_percent <= 0.0 {
            return Err(ConfigError::Validation("range_percent must be positive".to_string()));
        }

        if self.trading.poll_interval_secs <= 0.0 {
            return Err(ConfigError::Validation("poll_interval_secs must be positive".to_string()));
        }

        if self.risk.stop_loss_percent <= 0.0 || self.risk.stop_loss_percent >= 100.0 {
            return Err(ConfigError::Validation(
                "stop_loss_percent must be between 0 and 100".to_string(),
            ));
        }

        if self.simulation.start_price <= 0.0 {
            return Err(ConfigError::Validation("start_price must be positive".to_string()));
        }

        if self.simulation.walk_step_pct <= 0.0 {
            return Err(ConfigError::Validation("walk_step_pct must be positive".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
