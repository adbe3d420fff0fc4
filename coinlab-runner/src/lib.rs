//! CoinLab Runner: backtest orchestration around `coinlab-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run ids
//! - Bar loading from CoinGecko, CSV files or a seeded synthetic walk
//! - Single-run orchestration
//! - Parallel parameter sweeps
//! - JSON, CSV and Markdown export

pub mod coingecko;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use coingecko::{CoinGeckoClient, CoinInfo};
pub use config::{BacktestSection, ConfigError, DataSource, RunConfig, RunId};
pub use data_loader::{load_bars, LoadError, LoadedData, PricePoint};
pub use runner::{run_from_config, run_on_bars, RunError, RunOutcome};
pub use sweep::{run_sweep, ParamGrid, ParamRange, SweepEntry};
