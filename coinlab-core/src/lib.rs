//! CoinLab Core: price bars, indicators, strategies and the backtest loop.
//!
//! This crate holds everything a single backtest needs and nothing else:
//! - Domain types (bars, position, orders, order history)
//! - Indicator library (SMA, Wilder RSI, ARIMA fit and forecast)
//! - Fractional sizing model
//! - Strategy state machines (SMA crossover, RSI threshold, ARIMA forecast)
//! - Bar-by-bar engine and result aggregation
//!
//! No I/O. Loading, configuration and export live in `coinlab-runner`.

pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod report;
pub mod sizing;
pub mod strategy;

pub use domain::{Order, OrderHistory, OrderSide, Position, PriceBar};
pub use engine::{run, run_spec, run_with, run_with_config, BacktestResult, EngineConfig};
pub use error::BacktestError;
pub use report::OrderTable;
pub use sizing::{FractionalSizer, SizingError};
pub use strategy::{StrategyKind, StrategyParams, StrategySpec};

#[cfg(test)]
mod tests {
    use super::*;
    use strategy::BarContext;

    /// Compile-time check: everything a parallel sweep moves between threads
    /// is Send + Sync. If any type fails this check, the build breaks.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::OrderHistory>();
        require_sync::<domain::OrderHistory>();

        // Engine types
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::BacktestResult>();
        require_sync::<engine::BacktestResult>();
        require_send::<report::OrderTable>();
        require_sync::<report::OrderTable>();

        // Strategy types
        require_send::<strategy::StrategySpec>();
        require_sync::<strategy::StrategySpec>();
        require_send::<strategy::SmaCrossover>();
        require_sync::<strategy::SmaCrossover>();
        require_send::<strategy::RsiThreshold>();
        require_sync::<strategy::RsiThreshold>();
        require_send::<strategy::ArimaForecast>();
        require_sync::<strategy::ArimaForecast>();

        // Indicator types
        require_send::<indicators::IndicatorValues>();
        require_sync::<indicators::IndicatorValues>();
        require_send::<indicators::ArimaModel>();
        require_sync::<indicators::ArimaModel>();
    }

    /// Architecture contract: a strategy sees the current bar, a trailing
    /// window and indicator values for the current and previous bar only.
    ///
    /// `BarContext` has no field that reaches later bars, so a strategy
    /// cannot look ahead. This function breaks if that signature changes.
    #[test]
    fn bar_context_exposes_no_future_bars() {
        fn _check_context_shape<'a>(ctx: &BarContext<'a>) -> (&'a PriceBar, &'a [PriceBar]) {
            (ctx.bar, ctx.history)
        }
    }
}
