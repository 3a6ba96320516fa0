#![allow(dead_code)]

use pairtrader::domain::bar::{Bar, PriceSeries};
use pairtrader::domain::error::PairtraderError;
use pairtrader::domain::live::StopToken;
use pairtrader::ports::market_data_port::MarketDataPort;
use std::cell::Cell;
use std::io::Write;

pub fn make_bar(timestamp_ms: i64, close: f64) -> Bar {
    Bar {
        timestamp_ms,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar((i as i64 + 1) * 60_000, close))
        .collect();
    PriceSeries::from_bars("BTC/USDT", "1h", bars).unwrap()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Market data source that serves a fixed set of bars and counts calls.
pub struct StaticMarket {
    pub bars: Vec<Bar>,
    pub calls: Cell<usize>,
}

impl StaticMarket {
    pub fn from_closes(closes: &[f64]) -> Self {
        StaticMarket {
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| make_bar((i as i64 + 1) * 60_000, close))
                .collect(),
            calls: Cell::new(0),
        }
    }
}

impl MarketDataPort for StaticMarket {
    fn fetch_ohlcv(
        &self,
        _pair: &str,
        _timeframe: &str,
        since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError> {
        self.calls.set(self.calls.get() + 1);
        let mut bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| since_ms.is_none_or(|s| b.timestamp_ms >= s))
            .cloned()
            .collect();
        if let Some(limit) = limit {
            let start = bars.len().saturating_sub(limit);
            bars.drain(..start);
        }
        Ok(bars)
    }
}

/// Feeds a scripted sequence of bars a few at a time and stops the session
/// token once the script runs out.
pub struct ScriptedMarket {
    bars: Vec<Bar>,
    cursor: Cell<usize>,
    token: StopToken,
}

impl ScriptedMarket {
    pub fn from_closes(closes: &[f64], token: StopToken) -> Self {
        ScriptedMarket {
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| make_bar((i as i64 + 1) * 60_000, close))
                .collect(),
            cursor: Cell::new(0),
            token,
        }
    }
}

impl MarketDataPort for ScriptedMarket {
    fn fetch_ohlcv(
        &self,
        _pair: &str,
        _timeframe: &str,
        _since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError> {
        let start = self.cursor.get();
        let want = limit.unwrap_or(self.bars.len());
        let end = (start + want).min(self.bars.len());
        self.cursor.set(end);
        if end >= self.bars.len() {
            self.token.stop();
        }
        Ok(self.bars[start..end].to_vec())
    }
}
