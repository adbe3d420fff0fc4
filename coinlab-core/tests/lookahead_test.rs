//! Look-ahead contamination tests.
//!
//! Invariant: no value or decision at bar t may depend on bars after t.
//!
//! Method: run on a truncated series (bars 0..60) and on the full series
//! (bars 0..150). Everything up to bar 59 must be identical between the two
//! runs. Any difference means future data leaked into a past decision.

use chrono::{Duration, TimeZone, Utc};
use coinlab_core::indicators::{Indicator, Rsi, Sma};
use coinlab_core::strategy::{ArimaParams, RsiParams, SmaCrossoverParams, StrategySpec};
use coinlab_core::{run_spec, PriceBar};

const TRUNCATED: usize = 60;
const FULL: usize = 150;

/// Deterministic pseudo-random walk using a simple LCG.
fn make_test_bars(n: usize) -> Vec<PriceBar> {
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 30_000.0;
    let mut prev = price;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0; // -1.0 to +1.0
        price *= 1.0 + change * 0.04;

        bars.push(PriceBar::new(
            origin + Duration::days(i as i64),
            prev,
            prev.max(price),
            prev.min(price),
            price,
        ));
        prev = price;
    }

    bars
}

fn assert_indicator_prefix(indicator: &dyn Indicator, bars: &[PriceBar]) {
    let truncated = indicator.compute(&bars[..TRUNCATED]);
    let full = indicator.compute(bars);
    for t in 0..TRUNCATED {
        let (a, b) = (truncated[t], full[t]);
        assert!(
            (a.is_nan() && b.is_nan()) || a == b,
            "{} differs at bar {t}: truncated={a}, full={b}",
            indicator.name()
        );
    }
}

fn assert_run_prefix(spec: &StrategySpec, bars: &[PriceBar]) {
    let truncated = run_spec(&bars[..TRUNCATED], 10_000.0, spec).unwrap();
    let full = run_spec(bars, 10_000.0, spec).unwrap();

    let full_prefix: Vec<_> = full
        .order_history
        .iter()
        .filter(|order| order.bar_index < TRUNCATED)
        .collect();
    let truncated_orders: Vec<_> = truncated.order_history.iter().collect();
    assert_eq!(truncated_orders, full_prefix, "{} orders diverge", spec.label());
    assert_eq!(
        truncated.equity_curve[..],
        full.equity_curve[..TRUNCATED],
        "{} equity diverges",
        spec.label()
    );
}

#[test]
fn sma_has_no_lookahead() {
    let bars = make_test_bars(FULL);
    for period in [1, 2, 10, 30] {
        assert_indicator_prefix(&Sma::new(period), &bars);
    }
}

#[test]
fn rsi_has_no_lookahead() {
    let bars = make_test_bars(FULL);
    for period in [2, 3, 14] {
        assert_indicator_prefix(&Rsi::new(period), &bars);
    }
}

#[test]
fn sma_crossover_decisions_have_no_lookahead() {
    let spec = StrategySpec::SmaCrossover(SmaCrossoverParams {
        fast_period: 3,
        slow_period: 8,
    });
    assert_run_prefix(&spec, &make_test_bars(FULL));
}

#[test]
fn rsi_decisions_have_no_lookahead() {
    let spec = StrategySpec::Rsi(RsiParams {
        rsi_period: 5,
        overbought: 65.0,
        oversold: 35.0,
    });
    assert_run_prefix(&spec, &make_test_bars(FULL));
}

#[test]
fn arima_decisions_have_no_lookahead() {
    for (p, d, q) in [(0, 0, 0), (1, 0, 0), (1, 1, 0), (1, 0, 1)] {
        let spec = StrategySpec::Arima(ArimaParams {
            p,
            d,
            q,
            lookback: 20,
            threshold: 0.002,
            hold_period: 2,
            look_ahead: 3,
        });
        assert_run_prefix(&spec, &make_test_bars(FULL));
    }
}
