//! Backtest runner: wires configuration, data loading and the core engine.
//!
//! Two entry points:
//! - `run_from_config()`: loads bars from the configured source, then runs. Used by the CLI.
//! - `run_on_bars()`: takes pre-loaded bars. Used by sweeps and tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coinlab_core::{run_spec, BacktestError, BacktestResult, PriceBar};

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{dataset_hash, load_bars, LoadError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
}

/// A finished run together with what produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub dataset_hash: String,
    pub config: RunConfig,
    pub result: BacktestResult,
}

/// Load bars for `config` and run its strategy over them.
pub fn run_from_config(config: &RunConfig) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.backtest)?;
    execute(config, &loaded.bars, loaded.dataset_hash)
}

/// Run `config`'s strategy over bars the caller already has.
///
/// The `[backtest]` source settings are ignored; only the balance is used.
pub fn run_on_bars(config: &RunConfig, bars: &[PriceBar]) -> Result<RunOutcome, RunError> {
    config.validate()?;
    execute(config, bars, dataset_hash(bars))
}

fn execute(
    config: &RunConfig,
    bars: &[PriceBar],
    dataset_hash: String,
) -> Result<RunOutcome, RunError> {
    let run_id = config.run_id();
    let short_id = run_id.get(..12).unwrap_or(&run_id);
    let span = tracing::info_span!("run", run_id = short_id, strategy = %config.strategy.label());
    let _enter = span.enter();

    let result = run_spec(bars, config.backtest.initial_balance, &config.strategy)?;
    Ok(RunOutcome {
        run_id,
        dataset_hash,
        config: config.clone(),
        result,
    })
}
