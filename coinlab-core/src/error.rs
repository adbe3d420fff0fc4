//! Fatal backtest errors.
//!
//! Configuration and input-contract errors are raised before the bar loop
//! starts, so no state is mutated. `InvalidPrice` is raised mid-run and aborts
//! the run without a partial result. Recoverable per-bar failures (sizing,
//! model fit) never surface here; the engine logs them and skips the bar.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("insufficient data: {available} bars < minimum {required}")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid parameter '{param}' for {strategy}: {reason}")]
    InvalidParameter {
        strategy: String,
        param: String,
        reason: String,
    },

    #[error("invalid price {price} at bar {index} ({timestamp})")]
    InvalidPrice {
        index: usize,
        timestamp: DateTime<Utc>,
        price: f64,
    },

    #[error("bar {index} ({timestamp}) is not after the previous bar")]
    UnorderedSeries {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

impl BacktestError {
    pub(crate) fn invalid_param(
        strategy: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        BacktestError::InvalidParameter {
            strategy: strategy.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}
