//! Serializable strategy selection.
//!
//! [`StrategySpec`] is what config files and sweeps carry around: a tagged
//! union of the three parameter structs. [`StrategyKind`] is the bare name,
//! parsed leniently from user input ("SMA Crossover", "rsi-strategy", ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::params::{ParamSpec, StrategyParams};
use super::{
    arima_forecast, rsi_threshold, sma_crossover, ArimaForecast, ArimaParams, RsiParams,
    RsiThreshold, SmaCrossover, SmaCrossoverParams, Strategy,
};
use crate::error::BacktestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SmaCrossover,
    Rsi,
    Arima,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::SmaCrossover,
        StrategyKind::Rsi,
        StrategyKind::Arima,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SmaCrossover => sma_crossover::NAME,
            StrategyKind::Rsi => rsi_threshold::NAME,
            StrategyKind::Arima => arima_forecast::NAME,
        }
    }

    pub fn schema(&self) -> &'static [ParamSpec] {
        match self {
            StrategyKind::SmaCrossover => SmaCrossover::schema(),
            StrategyKind::Rsi => RsiThreshold::schema(),
            StrategyKind::Arima => ArimaForecast::schema(),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        let normalized = normalized.strip_suffix("_strategy").unwrap_or(&normalized);
        match normalized {
            "sma" | "smac" | "sma_crossover" => Ok(StrategyKind::SmaCrossover),
            "rsi" | "rsi_threshold" => Ok(StrategyKind::Rsi),
            "arima" | "arima_forecast" => Ok(StrategyKind::Arima),
            _ => Err(BacktestError::invalid_param(
                s,
                "type",
                "unknown strategy (expected sma_crossover, rsi or arima)",
            )),
        }
    }
}

/// A strategy name plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySpec {
    SmaCrossover(SmaCrossoverParams),
    Rsi(RsiParams),
    Arima(ArimaParams),
}

impl StrategySpec {
    /// Build from a loose name and an untyped parameter map.
    pub fn from_params(name: &str, params: &StrategyParams) -> Result<Self, BacktestError> {
        let spec = match name.parse::<StrategyKind>()? {
            StrategyKind::SmaCrossover => {
                StrategySpec::SmaCrossover(SmaCrossoverParams::from_params(params)?)
            }
            StrategyKind::Rsi => StrategySpec::Rsi(RsiParams::from_params(params)?),
            StrategyKind::Arima => StrategySpec::Arima(ArimaParams::from_params(params)?),
        };
        Ok(spec)
    }

    pub fn default_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SmaCrossover => StrategySpec::SmaCrossover(SmaCrossoverParams::default()),
            StrategyKind::Rsi => StrategySpec::Rsi(RsiParams::default()),
            StrategyKind::Arima => StrategySpec::Arima(ArimaParams::default()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategySpec::SmaCrossover(_) => StrategyKind::SmaCrossover,
            StrategySpec::Rsi(_) => StrategyKind::Rsi,
            StrategySpec::Arima(_) => StrategyKind::Arima,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn params(&self) -> StrategyParams {
        match self {
            StrategySpec::SmaCrossover(p) => p.to_params(),
            StrategySpec::Rsi(p) => p.to_params(),
            StrategySpec::Arima(p) => p.to_params(),
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        match self {
            StrategySpec::SmaCrossover(p) => p.validate(),
            StrategySpec::Rsi(p) => p.validate(),
            StrategySpec::Arima(p) => p.validate(),
        }
    }

    /// Compact label such as `sma_crossover(fast_period=10, slow_period=30)`.
    pub fn label(&self) -> String {
        let params = self
            .params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({params})", self.name())
    }
}
