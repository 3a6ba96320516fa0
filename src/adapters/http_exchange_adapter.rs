//! Exchange kline adapter over HTTP.
//!
//! Talks to a MEXC-compatible REST endpoint (`GET /api/v3/klines`) and maps
//! the JSON array-of-arrays payload into domain bars.

use crate::domain::bar::Bar;
use crate::domain::error::PairtraderError;
use crate::ports::market_data_port::MarketDataPort;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.mexc.com";

pub struct HttpExchangeAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpExchangeAdapter {
    pub fn new(base_url: &str) -> Result<Self, PairtraderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PairtraderError::Provider {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange symbols carry no separator: "BTC/USDT" becomes "BTCUSDT".
    fn symbol(pair: &str) -> String {
        pair.replace('/', "")
    }

    fn number(value: &serde_json::Value) -> Option<f64> {
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn parse_kline(row: &serde_json::Value) -> Result<Bar, PairtraderError> {
        let fields = row.as_array().ok_or_else(|| PairtraderError::Provider {
            reason: format!("kline row is not an array: {row}"),
        })?;
        if fields.len() < 6 {
            return Err(PairtraderError::Provider {
                reason: format!("kline row too short: {row}"),
            });
        }
        let timestamp_ms = fields[0].as_i64().ok_or_else(|| PairtraderError::Provider {
            reason: format!("kline open time is not an integer: {}", fields[0]),
        })?;
        let ohlcv: Vec<f64> = fields[1..6]
            .iter()
            .map(Self::number)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PairtraderError::Provider {
                reason: format!("kline row has non-numeric fields: {row}"),
            })?;
        Ok(Bar {
            timestamp_ms,
            open: ohlcv[0],
            high: ohlcv[1],
            low: ohlcv[2],
            close: ohlcv[3],
            volume: ohlcv[4],
        })
    }

    fn parse_klines(body: &str) -> Result<Vec<Bar>, PairtraderError> {
        let rows: serde_json::Value =
            serde_json::from_str(body).map_err(|e| PairtraderError::Provider {
                reason: format!("invalid kline response: {e}"),
            })?;
        let rows = rows.as_array().ok_or_else(|| PairtraderError::Provider {
            reason: format!("kline response is not an array: {rows}"),
        })?;
        rows.iter().map(Self::parse_kline).collect()
    }
}

impl MarketDataPort for HttpExchangeAdapter {
    fn fetch_ohlcv(
        &self,
        pair: &str,
        timeframe: &str,
        since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", Self::symbol(pair)),
            ("interval", timeframe.to_string()),
        ];
        if let Some(since) = since_ms {
            query.push(("startTime", since.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        tracing::debug!(pair, timeframe, ?since_ms, ?limit, "fetching klines");
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| PairtraderError::Provider {
                reason: format!("kline request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| PairtraderError::Provider {
            reason: format!("failed to read kline response: {e}"),
        })?;
        if !status.is_success() {
            return Err(PairtraderError::Provider {
                reason: format!("exchange returned {status}: {body}"),
            });
        }

        Self::parse_klines(&body)
    }
}
