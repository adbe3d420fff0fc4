//! End-to-end engine scenarios for the three built-in strategies.
//!
//! Each scenario uses a short hand-computed close series so that the exact
//! fill bars, prices and final values can be asserted.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use coinlab_core::strategy::{
    ArimaParams, ParamValue, RsiParams, SmaCrossoverParams, StrategyParams, StrategySpec,
};
use coinlab_core::{run, run_spec, BacktestError, OrderSide, PriceBar};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Daily bars starting 2024-03-01, open = previous close.
fn daily_bars(closes: &[f64]) -> Vec<PriceBar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar::new(
                start + Duration::days(i as i64),
                open,
                open.max(close),
                open.min(close),
                close,
            )
        })
        .collect()
}

fn sma(fast: usize, slow: usize) -> StrategySpec {
    StrategySpec::SmaCrossover(SmaCrossoverParams {
        fast_period: fast,
        slow_period: slow,
    })
}

fn rsi(period: usize) -> StrategySpec {
    StrategySpec::Rsi(RsiParams {
        rsi_period: period,
        ..RsiParams::default()
    })
}

fn arima(lookback: usize, hold_period: i64) -> StrategySpec {
    StrategySpec::Arima(ArimaParams {
        lookback,
        hold_period,
        ..ArimaParams::default()
    })
}

const SMA_SERIES: [f64; 13] = [
    10.0, 9.0, 8.0, 7.0, 6.0, 7.0, 8.0, 9.0, 10.0, 9.0, 8.0, 7.0, 6.0,
];
const RSI_SERIES: [f64; 10] = [
    100.0, 101.0, 102.0, 101.0, 100.0, 99.0, 98.0, 99.0, 100.0, 101.0,
];
const ARIMA_SERIES: [f64; 8] = [100.0, 100.0, 90.0, 120.0, 130.0, 140.0, 150.0, 160.0];

// ──────────────────────────────────────────────
// SMA crossover
// ──────────────────────────────────────────────

#[test]
fn sma_crossover_round_trip() {
    let bars = daily_bars(&SMA_SERIES);
    let result = run_spec(&bars, 1_000.0, &sma(2, 4)).unwrap();
    let orders = result.order_history.as_slice();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].bar_index, 6);
    assert_eq!(orders[0].order_type, OrderSide::Buy);
    assert_eq!(orders[0].price, 8.0);
    assert_eq!(orders[0].size, 125.0);
    assert_eq!(orders[0].indicators["sma_fast"], 7.5);
    assert_eq!(orders[0].indicators["sma_slow"], 7.0);
    assert_eq!(orders[0].date, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());

    assert_eq!(orders[1].bar_index, 10);
    assert_eq!(orders[1].order_type, OrderSide::Sell);
    assert_eq!(orders[1].price, 8.0);

    assert_eq!(result.final_value, 1_000.0);
    assert_eq!(result.profit, 0.0);
    assert_eq!(result.decision_bars, 10);
    assert_eq!(result.bar_count, 13);
}

#[test]
fn sma_series_of_exactly_slow_period_has_one_decision() {
    let bars = daily_bars(&SMA_SERIES[..4]);
    let result = run_spec(&bars, 1_000.0, &sma(2, 4)).unwrap();
    assert_eq!(result.decision_bars, 1);
    assert!(result.order_history.is_empty());
    assert_eq!(result.final_value, 1_000.0);
}

#[test]
fn sma_series_shorter_than_slow_period_is_rejected() {
    let bars = daily_bars(&SMA_SERIES[..3]);
    let err = run_spec(&bars, 1_000.0, &sma(2, 4)).unwrap_err();
    assert_eq!(
        err,
        BacktestError::InsufficientData {
            required: 4,
            available: 3
        }
    );
}

// ──────────────────────────────────────────────
// RSI threshold
// ──────────────────────────────────────────────

#[test]
fn rsi_buys_oversold_and_sells_overbought() {
    let bars = daily_bars(&RSI_SERIES);
    let result = run_spec(&bars, 990.0, &rsi(3)).unwrap();
    let orders = result.order_history.as_slice();

    assert_eq!(orders.len(), 2);
    assert_eq!((orders[0].bar_index, orders[0].price), (5, 99.0));
    assert_eq!(orders[0].size, 10.0);
    assert_eq!(orders[0].indicators["rsi"], 29.63);
    assert_eq!((orders[1].bar_index, orders[1].price), (9, 101.0));
    assert_eq!(orders[1].indicators["rsi"], 76.22);

    assert_eq!(result.final_value, 1_010.0);
    assert_eq!(result.profit, 20.0);
    assert!(result.final_position.is_flat());
}

#[test]
fn run_accepts_dashboard_names_and_param_maps() {
    let bars = daily_bars(&RSI_SERIES);
    let params = StrategyParams::from([("rsi_period".to_string(), ParamValue::Int(3))]);
    let by_name = run(&bars, 990.0, "RSI Strategy", &params).unwrap();
    let by_spec = run_spec(&bars, 990.0, &rsi(3)).unwrap();
    assert_eq!(by_name, by_spec);
    assert_eq!(by_name.strategy, "rsi");
}

#[test]
fn invalid_params_fail_before_the_loop() {
    let bars = daily_bars(&RSI_SERIES);
    let params = StrategyParams::from([
        ("overbought".to_string(), ParamValue::Float(20.0)),
        ("oversold".to_string(), ParamValue::Float(40.0)),
    ]);
    let err = run(&bars, 1_000.0, "rsi", &params).unwrap_err();
    assert!(matches!(err, BacktestError::InvalidParameter { .. }));

    let err = run(&bars, 1_000.0, "macd", &StrategyParams::new()).unwrap_err();
    assert!(matches!(err, BacktestError::InvalidParameter { ref param, .. } if param == "type"));
}

// ──────────────────────────────────────────────
// ARIMA forecast
// ──────────────────────────────────────────────

#[test]
fn arima_hold_period_defers_exit() {
    let bars = daily_bars(&ARIMA_SERIES);
    let result = run_spec(&bars, 900.0, &arima(3, 5)).unwrap();
    let orders = result.order_history.as_slice();

    assert_eq!(orders.len(), 2);
    assert_eq!((orders[0].bar_index, orders[0].price), (2, 90.0));
    // Sell signals on bars 3..=6 fall inside the five-day lockout.
    assert_eq!((orders[1].bar_index, orders[1].price), (7, 160.0));
    assert_eq!((orders[1].date - orders[0].date).num_days(), 5);

    assert_eq!(result.final_value, 1_600.0);
    assert_eq!(result.profit, 700.0);
    assert_eq!(result.model_fit_failures, 0);
}

#[test]
fn arima_without_hold_period_exits_next_bar() {
    let bars = daily_bars(&ARIMA_SERIES);
    let result = run_spec(&bars, 900.0, &arima(3, 0)).unwrap();
    let orders = result.order_history.as_slice();
    assert_eq!(orders[1].bar_index, 3);
    assert_eq!(orders[1].price, 120.0);
}

#[test]
fn arima_snapshot_records_forecast() {
    let bars = daily_bars(&ARIMA_SERIES);
    let result = run_spec(&bars, 900.0, &arima(3, 5)).unwrap();
    let buy = &result.order_history.as_slice()[0];
    let forecast = 290.0 / 3.0;
    assert!((buy.indicators["forecast"] - forecast).abs() < 1e-9);
    assert!((buy.indicators["predicted_change"] - (forecast - 90.0) / 90.0).abs() < 1e-12);
}

#[test]
fn arima_series_of_exactly_lookback_has_one_decision() {
    let bars = daily_bars(&ARIMA_SERIES[..3]);
    let result = run_spec(&bars, 900.0, &arima(3, 5)).unwrap();
    assert_eq!(result.decision_bars, 1);
    assert_eq!(result.order_history.len(), 1);

    let err = run_spec(&bars[..2], 900.0, &arima(3, 5)).unwrap_err();
    assert_eq!(
        err,
        BacktestError::InsufficientData {
            required: 3,
            available: 2
        }
    );
}

#[test]
fn arima_fit_failures_are_counted_not_fatal() {
    // AR(3) needs 8 observations; a 5-bar lookback never fits.
    let spec = StrategySpec::Arima(ArimaParams {
        p: 3,
        lookback: 5,
        ..ArimaParams::default()
    });
    let bars = daily_bars(&ARIMA_SERIES);
    let result = run_spec(&bars, 900.0, &spec).unwrap();
    assert!(result.order_history.is_empty());
    assert_eq!(result.decision_bars, 4);
    assert_eq!(result.model_fit_failures, 4);
    assert_eq!(result.final_value, 900.0);
}

// ──────────────────────────────────────────────
// Invariants and errors
// ──────────────────────────────────────────────

#[test]
fn final_value_identity_holds_with_open_position() {
    let mut closes = SMA_SERIES[..9].to_vec();
    closes.push(12.0);
    let bars = daily_bars(&closes);
    let result = run_spec(&bars, 1_000.0, &sma(2, 4)).unwrap();
    assert!(result.final_position.is_long());
    let expected = result.final_cash + result.final_position.size * 12.0;
    assert!((result.final_value - expected).abs() < 1e-9);
    assert_eq!(result.equity_curve.len(), bars.len());
    assert_eq!(result.equity_curve.last().copied(), Some(result.final_value));
}

#[test]
fn order_value_is_size_times_price() {
    let bars = daily_bars(&RSI_SERIES);
    let result = run_spec(&bars, 1_234.56, &rsi(3)).unwrap();
    for order in &result.order_history {
        assert!((order.value - order.size * order.price).abs() < 1e-9);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let bars = daily_bars(&ARIMA_SERIES);
    let spec = StrategySpec::Arima(ArimaParams {
        p: 1,
        lookback: 6,
        hold_period: 0,
        ..ArimaParams::default()
    });
    let first = run_spec(&bars, 1_000.0, &spec).unwrap();
    let second = run_spec(&bars, 1_000.0, &spec).unwrap();
    assert_eq!(first, second);
}

#[test]
fn arma_runs_are_identical() {
    let closes: Vec<f64> = (0..120)
        .map(|i| {
            let noise = ((i * 7919) % 1000) as f64 / 200.0 - 2.5;
            100.0 + (i as f64 * 0.3).sin() * 8.0 + noise
        })
        .collect();
    let bars = daily_bars(&closes);
    let spec = StrategySpec::Arima(ArimaParams {
        p: 1,
        d: 0,
        q: 1,
        lookback: 40,
        threshold: 0.005,
        hold_period: 0,
        look_ahead: 3,
    });

    let first = run_spec(&bars, 1_000.0, &spec).unwrap();
    let second = run_spec(&bars, 1_000.0, &spec).unwrap();
    assert!(first.model_fit_failures < first.decision_bars);
    assert_eq!(first.order_history, second.order_history);
    assert_eq!(first.final_value.to_bits(), second.final_value.to_bits());
    assert_eq!(first, second);
}

#[test]
fn sma_equal_means_never_cross() {
    for (a, b) in [(0.3, 0.7), (0.1, 0.2), (30_000.1, 29_999.3)] {
        let closes: Vec<f64> = (0..365).map(|i| if i % 2 == 0 { a } else { b }).collect();
        let bars = daily_bars(&closes);
        let result = run_spec(&bars, 1_000.0, &sma(2, 4)).unwrap();
        assert!(result.order_history.is_empty(), "a={a} b={b}");
    }
}

#[test]
fn empty_series_fails_before_loop() {
    let err = run_spec(&[], 1_000.0, &rsi(3)).unwrap_err();
    assert!(matches!(err, BacktestError::InsufficientData { available: 0, .. }));
}

#[test]
fn negative_price_aborts_with_index() {
    let mut bars = daily_bars(&RSI_SERIES);
    bars[7].close = -1.0;
    let err = run_spec(&bars, 1_000.0, &rsi(3)).unwrap_err();
    assert!(matches!(err, BacktestError::InvalidPrice { index: 7, .. }));
}

#[test]
fn out_of_order_series_is_rejected() {
    let mut bars = daily_bars(&RSI_SERIES);
    bars.swap(3, 4);
    let err = run_spec(&bars, 1_000.0, &rsi(3)).unwrap_err();
    assert!(matches!(err, BacktestError::UnorderedSeries { index: 4, .. }));
}

#[test]
fn order_table_exports_union_columns() {
    let bars = daily_bars(&RSI_SERIES);
    let result = run_spec(&bars, 990.0, &rsi(3)).unwrap();
    let table = result.order_table();
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(0, "rsi").as_deref(), Some("29.63"));
    assert_eq!(table.cell(0, "sma_fast"), None);
    assert_eq!(table.cell(1, "order_type").as_deref(), Some("sell"));
}
