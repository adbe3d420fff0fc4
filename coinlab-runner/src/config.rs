//! Serializable run configuration.
//!
//! A run is described by a TOML file with two tables:
//!
//! ```toml
//! [backtest]
//! coin = "bitcoin"
//! vs_currency = "usd"
//! days = 180
//! initial_balance = 10000.0
//!
//! [strategy]
//! type = "arima"
//! lookback = 30
//! hold_period = 5
//! ```
//!
//! Missing strategy parameters take their defaults. `[backtest.source]`
//! selects where bars come from and defaults to CoinGecko.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coinlab_core::{BacktestError, StrategySpec};

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

pub const MAX_DAYS: u32 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Strategy(#[from] BacktestError),
}

/// Where a run gets its bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// CoinGecko market chart for `coin` / `vs_currency` / `days`.
    Coingecko,
    /// `timestamp,open,high,low,close` CSV file.
    Csv { path: PathBuf },
    /// Seeded random walk, one bar per day.
    Synthetic {
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_start_price")]
        start_price: f64,
    },
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Coingecko
    }
}

fn default_seed() -> u64 {
    42
}

fn default_start_price() -> f64 {
    30_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub coin: String,
    pub vs_currency: String,
    pub days: u32,
    pub initial_balance: f64,
    pub source: DataSource,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            coin: "bitcoin".into(),
            vs_currency: "usd".into(),
            days: 180,
            initial_balance: 10_000.0,
            source: DataSource::default(),
        }
    }
}

impl BacktestSection {
    /// Checks the data and balance settings on their own, without a strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coin.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.coin is empty".into()));
        }
        if self.vs_currency.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.vs_currency is empty".into()));
        }
        if self.days == 0 || self.days > MAX_DAYS {
            return Err(ConfigError::Invalid(format!(
                "backtest.days = {} outside 1..={MAX_DAYS}",
                self.days
            )));
        }
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "backtest.initial_balance = {} must be positive",
                self.initial_balance
            )));
        }
        if let DataSource::Synthetic { start_price, .. } = self.source {
            if !(start_price.is_finite() && start_price > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "synthetic start_price = {start_price} must be positive"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub backtest: BacktestSection,
    pub strategy: StrategySpec,
}

impl RunConfig {
    pub fn new(strategy: StrategySpec) -> Self {
        Self {
            backtest: BacktestSection::default(),
            strategy,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        self.strategy.validate()?;
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        // Serializing plain structs and enums to JSON cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
