//! Bar-by-bar event loop.
//!
//! One pass, strictly in order. For every bar:
//! 1. Check the reference price (fatal if not a positive finite number).
//! 2. From the first decision index on, ask the strategy for an action.
//! 3. Execute it at the bar's close through the sizer, book the fill.
//! 4. Mark the portfolio to market.
//!
//! Orders fill immediately and completely at the signalling bar's close. There
//! is no slippage, no commission, no partial fill and no order book.

use crate::domain::{Order, OrderHistory, OrderSide, PriceBar};
use crate::error::BacktestError;
use crate::indicators::precompute;
use crate::strategy::{
    Action, ArimaForecast, BarContext, IndicatorView, RsiThreshold, SmaCrossover, Strategy,
    StrategyParams, StrategySpec,
};

use super::result::BacktestResult;
use super::state::{EngineConfig, Portfolio};

/// Run a strategy named by a loose name and an untyped parameter map.
pub fn run(
    bars: &[PriceBar],
    initial_balance: f64,
    strategy: &str,
    params: &StrategyParams,
) -> Result<BacktestResult, BacktestError> {
    let spec = StrategySpec::from_params(strategy, params)?;
    run_spec(bars, initial_balance, &spec)
}

/// Run a typed strategy selection.
pub fn run_spec(
    bars: &[PriceBar],
    initial_balance: f64,
    spec: &StrategySpec,
) -> Result<BacktestResult, BacktestError> {
    match *spec {
        StrategySpec::SmaCrossover(params) => {
            run_with(bars, initial_balance, &SmaCrossover::new(params)?)
        }
        StrategySpec::Rsi(params) => run_with(bars, initial_balance, &RsiThreshold::new(params)?),
        StrategySpec::Arima(params) => {
            run_with(bars, initial_balance, &ArimaForecast::new(params)?)
        }
    }
}

/// Run a constructed strategy with the default full-cash sizer.
pub fn run_with<S: Strategy>(
    bars: &[PriceBar],
    initial_balance: f64,
    strategy: &S,
) -> Result<BacktestResult, BacktestError> {
    run_with_config(bars, &EngineConfig::new(initial_balance), strategy)
}

pub fn run_with_config<S: Strategy>(
    bars: &[PriceBar],
    config: &EngineConfig,
    strategy: &S,
) -> Result<BacktestResult, BacktestError> {
    validate_inputs(bars, config, strategy)?;

    let indicator_values = precompute(bars, &strategy.indicators());
    let first_decision = strategy.first_decision_index();
    let window = strategy.window().max(1);

    let mut portfolio = Portfolio::new(config.initial_balance);
    let mut history = OrderHistory::new();
    let mut state = S::State::default();
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut decision_bars = 0;

    for (index, bar) in bars.iter().enumerate() {
        let price = bar.reference_price();
        if !(price.is_finite() && price > 0.0) {
            return Err(BacktestError::InvalidPrice {
                index,
                timestamp: bar.timestamp,
                price,
            });
        }

        if index >= first_decision {
            let ctx = BarContext {
                index,
                bar,
                history: &bars[(index + 1).saturating_sub(window)..=index],
                indicators: IndicatorView::new(&indicator_values, index),
                position: portfolio.position,
            };
            let step = strategy.on_bar(&ctx, state);
            state = step.state;
            decision_bars += 1;

            if let Some(order) = execute(step.action, index, bar, &portfolio, config, || {
                strategy.indicator_snapshot(&state)
            }) {
                tracing::debug!(
                    bar = index,
                    date = %order.date,
                    side = %order.order_type,
                    size = order.size,
                    price = order.price,
                    "fill"
                );
                portfolio.apply(&order);
                state = strategy.on_fill(&order, state);
                history.push(order);
            }
        }

        equity_curve.push(portfolio.equity(price));
    }

    // Validation guarantees at least one bar.
    let last_close = bars.last().map_or(0.0, |bar| bar.close);
    let final_value = portfolio.equity(last_close);
    let profit = final_value - config.initial_balance;
    let model_fit_failures = strategy.fit_failures(&state);

    tracing::info!(
        strategy = strategy.name(),
        bars = bars.len(),
        orders = history.len(),
        final_value,
        profit,
        model_fit_failures,
        "backtest complete"
    );

    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        initial_balance: config.initial_balance,
        final_value,
        profit,
        final_cash: portfolio.cash,
        final_position: portfolio.position,
        bar_count: bars.len(),
        decision_bars,
        model_fit_failures,
        order_history: history,
        equity_curve,
    })
}

/// Everything that can be rejected before the loop touches any state.
fn validate_inputs<S: Strategy>(
    bars: &[PriceBar],
    config: &EngineConfig,
    strategy: &S,
) -> Result<(), BacktestError> {
    if !(config.initial_balance.is_finite() && config.initial_balance > 0.0) {
        return Err(BacktestError::invalid_param(
            strategy.name(),
            "initial_balance",
            format!("{} must be a positive number", config.initial_balance),
        ));
    }

    let required = strategy.min_bars().max(1);
    if bars.len() < required {
        return Err(BacktestError::InsufficientData {
            required,
            available: bars.len(),
        });
    }

    if let Some(index) = bars
        .windows(2)
        .position(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(BacktestError::UnorderedSeries {
            index: index + 1,
            timestamp: bars[index + 1].timestamp,
        });
    }
    Ok(())
}

/// Turn an action into a fill, or `None` when there is nothing to do.
///
/// An entry while long or an exit while flat is ignored. A sizing failure
/// is logged and skipped, never fatal.
fn execute(
    action: Action,
    index: usize,
    bar: &PriceBar,
    portfolio: &Portfolio,
    config: &EngineConfig,
    snapshot: impl FnOnce() -> crate::domain::IndicatorSnapshot,
) -> Option<Order> {
    match action {
        Action::NoOp => None,
        Action::EnterLong { size } => {
            if !portfolio.position.is_flat() {
                tracing::debug!(bar = index, "entry ignored, already long");
                return None;
            }
            match config
                .sizer
                .resolve(size, portfolio.cash, bar.reference_price())
            {
                Ok(size) => Some(Order::fill(index, bar, OrderSide::Buy, size, snapshot())),
                Err(err) => {
                    tracing::warn!(bar = index, date = %bar.date(), error = %err, "entry skipped");
                    None
                }
            }
        }
        Action::ExitToFlat => {
            if portfolio.position.is_flat() {
                tracing::debug!(bar = index, "exit ignored, already flat");
                return None;
            }
            Some(Order::fill(
                index,
                bar,
                OrderSide::Sell,
                portfolio.position.size,
                snapshot(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;
    use crate::indicators::make_bars;
    use crate::sizing::FractionalSizer;
    use crate::strategy::{ParamSpec, Step};

    /// Buys on the bars listed in `buy_at`, sells on `sell_at`.
    #[derive(Debug)]
    struct Scripted {
        buy_at: Vec<usize>,
        sell_at: Vec<usize>,
        size: Option<f64>,
    }

    impl Strategy for Scripted {
        type State = ();

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn schema() -> &'static [ParamSpec] {
            &[]
        }

        fn indicators(&self) -> Vec<Box<dyn crate::indicators::Indicator>> {
            Vec::new()
        }

        fn first_decision_index(&self) -> usize {
            0
        }

        fn window(&self) -> usize {
            1
        }

        fn on_bar(&self, ctx: &BarContext<'_>, state: ()) -> Step<()> {
            let action = if self.buy_at.contains(&ctx.index) {
                Action::EnterLong { size: self.size }
            } else if self.sell_at.contains(&ctx.index) {
                Action::ExitToFlat
            } else {
                Action::NoOp
            };
            Step::new(action, state)
        }

        fn indicator_snapshot(&self, _state: &()) -> crate::domain::IndicatorSnapshot {
            Default::default()
        }
    }

    fn scripted(buy_at: &[usize], sell_at: &[usize]) -> Scripted {
        Scripted {
            buy_at: buy_at.to_vec(),
            sell_at: sell_at.to_vec(),
            size: None,
        }
    }

    #[test]
    fn full_cash_round_trip() {
        let bars = make_bars(&[100.0, 200.0, 150.0]);
        let result = run_with(&bars, 1_000.0, &scripted(&[0], &[1])).unwrap();
        assert_eq!(result.order_history.len(), 2);
        assert_eq!(result.final_value, 2_000.0);
        assert_eq!(result.profit, 1_000.0);
        assert_eq!(result.equity_curve, vec![1_000.0, 2_000.0, 2_000.0]);
        assert_eq!(result.decision_bars, 3);
    }

    #[test]
    fn open_position_is_marked_at_last_close() {
        let bars = make_bars(&[100.0, 200.0, 150.0]);
        let result = run_with(&bars, 1_000.0, &scripted(&[0], &[])).unwrap();
        assert_eq!(result.final_position.size, 10.0);
        assert_eq!(result.final_value, 1_500.0);
        assert_eq!(result.final_cash, 0.0);
    }

    #[test]
    fn double_entry_and_flat_exit_are_ignored() {
        let bars = make_bars(&[100.0, 110.0, 120.0, 130.0]);
        let result = run_with(&bars, 1_000.0, &scripted(&[0, 1], &[2, 3])).unwrap();
        assert_eq!(result.order_history.len(), 2);
        assert!(result.order_history.alternates());
    }

    #[test]
    fn explicit_size_is_capped_by_cash() {
        let bars = make_bars(&[100.0, 100.0]);
        let mut strategy = scripted(&[0], &[]);
        strategy.size = Some(2.0);
        let result = run_with(&bars, 1_000.0, &strategy).unwrap();
        assert_eq!(result.final_position.size, 2.0);
        assert_eq!(result.final_cash, 800.0);

        strategy.size = Some(50.0);
        let result = run_with(&bars, 1_000.0, &strategy).unwrap();
        assert_eq!(result.final_position.size, 10.0);
    }

    #[test]
    fn invalid_request_is_skipped_not_fatal() {
        let bars = make_bars(&[100.0, 100.0]);
        let mut strategy = scripted(&[0], &[]);
        strategy.size = Some(-1.0);
        let result = run_with(&bars, 1_000.0, &strategy).unwrap();
        assert!(result.order_history.is_empty());
        assert_eq!(result.final_value, 1_000.0);
    }

    #[test]
    fn leverage_flows_through_config() {
        let bars = make_bars(&[100.0, 100.0]);
        let config = EngineConfig::new(1_000.0).with_sizer(FractionalSizer::with_leverage(0.5).unwrap());
        let result = run_with_config(&bars, &config, &scripted(&[0], &[])).unwrap();
        assert_eq!(result.final_position.size, 5.0);
        assert_eq!(result.final_cash, 500.0);
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = run_with(&[], 1_000.0, &scripted(&[], &[])).unwrap_err();
        assert_eq!(
            err,
            BacktestError::InsufficientData {
                required: 1,
                available: 0
            }
        );
    }

    #[test]
    fn non_positive_balance_is_rejected() {
        let bars = make_bars(&[100.0]);
        for balance in [0.0, -5.0, f64::NAN] {
            let err = run_with(&bars, balance, &scripted(&[], &[])).unwrap_err();
            assert!(matches!(err, BacktestError::InvalidParameter { ref param, .. } if param == "initial_balance"));
        }
    }

    #[test]
    fn zero_price_is_fatal_with_bar_context() {
        let mut bars = make_bars(&[100.0, 100.0, 100.0]);
        bars[2].close = 0.0;
        let err = run_with(&bars, 1_000.0, &scripted(&[0], &[])).unwrap_err();
        assert_eq!(
            err,
            BacktestError::InvalidPrice {
                index: 2,
                timestamp: bars[2].timestamp,
                price: 0.0,
            }
        );
    }

    #[test]
    fn duplicate_timestamp_is_rejected() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = run_with(&bars, 1_000.0, &scripted(&[], &[])).unwrap_err();
        assert_eq!(
            err,
            BacktestError::UnorderedSeries {
                index: 2,
                timestamp: bars[1].timestamp,
            }
        );
    }

    #[test]
    fn position_replays_from_history() {
        let bars = make_bars(&[100.0, 120.0, 90.0, 95.0, 130.0]);
        let result = run_with(&bars, 1_000.0, &scripted(&[0, 2], &[1])).unwrap();
        let replayed = result.order_history.replay_position();
        assert_eq!(replayed, result.final_position);
        assert_ne!(replayed, Position::flat());
    }
}
