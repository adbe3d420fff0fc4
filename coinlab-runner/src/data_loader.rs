//! Bar loading for the runner.
//!
//! Resolves a [`DataSource`] into a clean bar series:
//! 1. CoinGecko: fetch price points, convert to OHLC bars
//! 2. CSV: read `timestamp,open,high,low,close` rows
//! 3. Synthetic: seeded random walk
//!
//! Every path ends in [`normalize`], which sorts by timestamp and drops
//! duplicates, so the engine always receives a strictly increasing series.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use coinlab_core::PriceBar;

use crate::coingecko::CoinGeckoClient;
use crate::config::{BacktestSection, DataSource};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("CoinGecko returned status {status} for '{coin}'")]
    Status { coin: String, status: u16 },
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("no usable bars in {0}")]
    Empty(String),
}

/// One (timestamp, price) observation from a price-only feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Bars plus where they came from.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<PriceBar>,
    pub source: DataSource,
    /// BLAKE3 over every bar, for fingerprinting runs.
    pub dataset_hash: String,
}

/// Load the bars a run configuration asks for.
pub fn load_bars(section: &BacktestSection) -> Result<LoadedData, LoadError> {
    let bars = match &section.source {
        DataSource::Coingecko => {
            let client = CoinGeckoClient::new()?;
            let points = client.market_chart(&section.coin, &section.vs_currency, section.days)?;
            bars_from_prices(&points)
        }
        DataSource::Csv { path } => load_csv(path)?,
        DataSource::Synthetic { seed, start_price } => {
            let origin = Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now)
                - Duration::days(i64::from(section.days));
            synthetic_bars(*seed, origin, section.days as usize, *start_price)
        }
    };

    let bars = normalize(bars);
    if bars.is_empty() {
        return Err(LoadError::Empty(section.coin.clone()));
    }
    tracing::info!(
        coin = %section.coin,
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "loaded bars"
    );

    Ok(LoadedData {
        dataset_hash: dataset_hash(&bars),
        bars,
        source: section.source.clone(),
    })
}

/// Price-only series to OHLC bars.
///
/// Each bar opens at the previous price and has high = low = close = price.
/// The first point has no previous price and is dropped.
pub fn bars_from_prices(points: &[PricePoint]) -> Vec<PriceBar> {
    points
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (pair[0], pair[1]);
            PriceBar::new(cur.timestamp, prev.price, cur.price, cur.price, cur.price)
        })
        .collect()
}

/// Sort by timestamp and keep the first bar of each duplicated timestamp.
pub fn normalize(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|bar| bar.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|bar| bar.timestamp);
    if bars.len() < before {
        tracing::warn!(dropped = before - bars.len(), "dropped duplicate timestamps");
    }
    bars
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

/// Load bars from a CSV file with a `timestamp,open,high,low,close` header.
pub fn load_csv(path: &Path) -> Result<Vec<PriceBar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_csv(file)
}

/// Parse bars from any CSV reader. Rows come back in file order.
///
/// `timestamp` may be RFC 3339, a `YYYY-MM-DD` date (midnight UTC) or Unix
/// milliseconds.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<PriceBar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        // Header is line 1.
        let line = i + 2;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::InvalidRow {
            row: line,
            reason: format!("unrecognized timestamp '{}'", row.timestamp),
        })?;
        bars.push(PriceBar::new(timestamp, row.open, row.high, row.low, row.close));
    }
    Ok(bars)
}

/// Write bars in the format [`read_csv`] accepts, timestamps as RFC 3339.
pub fn write_csv<W: Write>(bars: &[PriceBar], writer: W) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "open", "high", "low", "close"])?;
    for bar in bars {
        wtr.write_record([
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
        ])?;
    }
    wtr.flush().map_err(|source| LoadError::Io {
        path: "<csv writer>".into(),
        source,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Seeded random walk, one bar per day starting at `origin`.
///
/// Daily log-returns are uniform in +-4%. Same seed, same series.
pub fn synthetic_bars(
    seed: u64,
    origin: DateTime<Utc>,
    count: usize,
    start_price: f64,
) -> Vec<PriceBar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start_price;
    (0..count)
        .map(|i| {
            let open = price;
            let close = open * rng.gen_range(-0.04..0.04_f64).exp();
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            price = close;
            PriceBar::new(origin + Duration::days(i as i64), open, high, low, close)
        })
        .collect()
}

/// Compute a deterministic BLAKE3 hash over all bar data.
pub fn dataset_hash(bars: &[PriceBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
