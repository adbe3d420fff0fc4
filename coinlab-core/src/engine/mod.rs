//! Backtesting engine: the bar loop and its supporting state.
//!
//! A run validates its inputs, precomputes the strategy's indicators, then
//! walks the series once. Each run owns its cash, position and order history,
//! so independent runs can execute in parallel; a single run never does.

pub mod loop_runner;
pub mod result;
pub mod state;

pub use loop_runner::{run, run_spec, run_with, run_with_config};
pub use result::BacktestResult;
pub use state::{EngineConfig, Portfolio};
