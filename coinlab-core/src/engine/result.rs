//! Summary of a completed run.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderHistory, Position};
use crate::report::OrderTable;

/// Everything a caller gets back from a successful run.
///
/// `final_value` is the last bar's mark-to-market: `final_cash +
/// final_position.size * last_close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub initial_balance: f64,
    pub final_value: f64,
    pub profit: f64,
    pub final_cash: f64,
    pub final_position: Position,
    pub bar_count: usize,
    /// Bars on which the strategy was consulted.
    pub decision_bars: usize,
    pub model_fit_failures: usize,
    pub order_history: OrderHistory,
    /// Mark-to-market value after each bar.
    pub equity_curve: Vec<f64>,
}

impl BacktestResult {
    pub fn order_table(&self) -> OrderTable {
        OrderTable::from_history(&self.order_history)
    }

    pub fn trade_count(&self) -> usize {
        self.order_history.len()
    }

    /// Closed buy/sell pairs.
    pub fn round_trips(&self) -> usize {
        self.order_history.sells().count()
    }

    /// Profit as a percentage of the starting balance.
    pub fn return_pct(&self) -> f64 {
        self.profit / self.initial_balance * 100.0
    }

    /// Largest peak-to-trough drop of the equity curve, as a fraction of the peak.
    pub fn max_drawdown(&self) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut worst = 0.0_f64;
        for &equity in &self.equity_curve {
            peak = peak.max(equity);
            if peak > 0.0 {
                worst = worst.max((peak - equity) / peak);
            }
        }
        worst
    }
}
