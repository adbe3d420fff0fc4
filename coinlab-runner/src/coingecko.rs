//! CoinGecko market-data client.
//!
//! Two endpoints are used:
//! - `/coins/{id}/market_chart`: `[ms_timestamp, price]` pairs for the last
//!   `days` days
//! - `/coins/list`: every coin id the API knows
//!
//! The API is unauthenticated and rate limited; a non-200 status surfaces as
//! [`LoadError::Status`] without retrying.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::data_loader::{LoadError, PricePoint};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// One entry of the coin list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinInfo {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

pub struct CoinGeckoClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self, LoadError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("coinlab/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Price history for `coin` quoted in `vs_currency`, oldest first.
    pub fn market_chart(
        &self,
        coin: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, LoadError> {
        let url = format!("{}/coins/{coin}/market_chart", self.base_url);
        tracing::debug!(%url, vs_currency, days, "fetching market chart");
        let days = days.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("vs_currency", vs_currency), ("days", days.as_str())])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                coin: coin.to_string(),
                status: status.as_u16(),
            });
        }
        parse_market_chart(&response.text()?)
    }

    pub fn coin_list(&self) -> Result<Vec<CoinInfo>, LoadError> {
        let url = format!("{}/coins/list", self.base_url);
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                coin: "*".into(),
                status: status.as_u16(),
            });
        }
        serde_json::from_str(&response.text()?)
            .map_err(|e| LoadError::Response(format!("coin list: {e}")))
    }
}

/// Parse a `market_chart` response body into price points.
///
/// Points with a non-finite price or an out-of-range timestamp are an error,
/// not silently skipped.
pub fn parse_market_chart(body: &str) -> Result<Vec<PricePoint>, LoadError> {
    let chart: MarketChart = serde_json::from_str(body)
        .map_err(|e| LoadError::Response(format!("market chart: {e}")))?;

    chart
        .prices
        .into_iter()
        .enumerate()
        .map(|(i, (ms, price))| {
            let timestamp = Utc
                .timestamp_millis_opt(ms as i64)
                .single()
                .ok_or_else(|| LoadError::Response(format!("point {i}: bad timestamp {ms}")))?;
            if !price.is_finite() {
                return Err(LoadError::Response(format!("point {i}: bad price {price}")));
            }
            Ok(PricePoint { timestamp, price })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_price_pairs() {
        let body = r#"{
            "prices": [[1704067200000, 42000.5], [1704153600000, 43100.25]],
            "market_caps": [],
            "total_volumes": []
        }"#;
        let points = parse_market_chart(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(points[1].price, 43100.25);
    }

    #[test]
    fn missing_prices_is_an_error() {
        let err = parse_market_chart(r#"{"error": "coin not found"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Response(_)));
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = CoinGeckoClient::with_base_url("http://localhost:9/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9");
    }
}
