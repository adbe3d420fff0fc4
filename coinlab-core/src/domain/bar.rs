//! One time-step of the historical price series.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLC bar for the single traded instrument.
///
/// Bars are immutable once loaded. A series handed to the engine must be in
/// strictly increasing `timestamp` order with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// Calendar date of the bar (UTC).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Price at which orders on this bar fill. Fills happen on the close of
    /// the signalling bar.
    pub fn reference_price(&self) -> f64 {
        self.close
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> PriceBar {
        PriceBar::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            42_000.0,
            43_500.0,
            41_800.0,
            43_100.0,
        )
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 41_000.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn reference_price_is_close() {
        assert_eq!(sample_bar().reference_price(), 43_100.0);
    }

    #[test]
    fn date_is_utc_calendar_day() {
        let bar = PriceBar::new(
            Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap(),
            1.0,
            1.0,
            1.0,
            1.0,
        );
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }
}
