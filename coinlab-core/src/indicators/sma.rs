//! Simple moving average of closes.
//!
//! First valid value at index period-1. Any NaN close poisons every window
//! that contains it.
//!
//! Each window is summed from scratch with an exactly rounded sum, so no
//! rounding drift carries from one bar to the next.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: Self::key(period),
        }
    }

    /// Series key for a given period.
    pub fn key(period: usize) -> String {
        format!("sma_{period}")
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        if bars.len() < self.period {
            return result;
        }

        for (i, window) in bars.windows(self.period).enumerate() {
            if window.iter().any(|bar| bar.close.is_nan()) {
                continue;
            }
            let sum = exact_sum(window.iter().map(|bar| bar.close));
            result[i + self.period - 1] = sum / self.period as f64;
        }

        result
    }
}

/// Sum with a single final rounding, using Shewchuk's non-overlapping partials.
fn exact_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut partials: Vec<f64> = Vec::new();
    for value in values {
        let mut x = value;
        let mut kept = 0;
        for j in 0..partials.len() {
            let mut y = partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        partials.truncate(kept);
        partials.push(x);
    }
    partials.iter().sum()
}
