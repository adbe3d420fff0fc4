//! Indicator library.
//!
//! SMA and RSI implement [`Indicator`]: a pure function from the bar series to
//! a value series of equal length, precomputed once before the bar loop and
//! read back per bar through [`IndicatorValues`]. ARIMA is fitted per bar on
//! a trailing window instead, see [`arima`].

use std::collections::HashMap;

use crate::domain::PriceBar;

pub mod arima;
pub mod rsi;
pub mod sma;

pub use arima::{ArimaModel, ArimaOrder, ModelFitError};
pub use rsi::Rsi;
pub use sma::Sma;

/// A precomputable indicator series.
///
/// # Look-ahead contamination guard
/// The value at bar t may only depend on bars 0..=t. Computing on a truncated
/// series must reproduce the prefix of the full-series result.
pub trait Indicator: Send + Sync {
    /// Series key, e.g. "sma_10".
    fn name(&self) -> &str;

    /// Index of the first valid output. Earlier values are `f64::NAN`.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;
}

/// Precomputed indicator series, queried by bar index during the loop.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Value at `bar_index`, NaN included. `None` if the series or index is missing.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Compute every indicator over the full series.
pub fn precompute(bars: &[PriceBar], indicators: &[Box<dyn Indicator>]) -> IndicatorValues {
    let mut values = IndicatorValues::new();
    for indicator in indicators {
        let series = indicator.compute(bars);
        debug_assert_eq!(
            series.len(),
            bars.len(),
            "indicator '{}' produced {} values for {} bars",
            indicator.name(),
            series.len(),
            bars.len()
        );
        values.insert(indicator.name(), series);
    }
    values
}

/// Daily bars from close prices, open = previous close.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
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

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_insert_and_get() {
        let mut iv = IndicatorValues::new();
        iv.insert("sma_3", vec![f64::NAN, f64::NAN, 11.0, 12.0]);
        assert!(iv.get("sma_3", 0).unwrap().is_nan());
        assert_eq!(iv.get("sma_3", 2), Some(11.0));
        assert_eq!(iv.get("sma_3", 4), None);
        assert_eq!(iv.get("rsi_14", 0), None);
    }

    #[test]
    fn precompute_keys_by_name() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let indicators: Vec<Box<dyn Indicator>> = vec![Box::new(Sma::new(3)), Box::new(Rsi::new(2))];
        let iv = precompute(&bars, &indicators);
        assert_eq!(iv.len(), 2);
        assert_approx(iv.get("sma_3", 2).unwrap(), 11.0, DEFAULT_EPSILON);
        assert_eq!(iv.get_series("rsi_2").map(|s| s.len()), Some(5));
    }

    #[test]
    fn precompute_empty_set() {
        let iv = precompute(&make_bars(&[1.0, 2.0]), &[]);
        assert!(iv.is_empty());
    }
}
