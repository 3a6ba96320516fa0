//! Read-through CSV candle cache.
//!
//! Wraps another market data source and persists historical fetches to disk so
//! repeated backtests over the same range stop hitting the exchange. Only
//! requests with an explicit `since_ms` are cacheable; latest-candle polls
//! pass straight through.

use crate::domain::bar::Bar;
use crate::domain::error::PairtraderError;
use crate::ports::market_data_port::MarketDataPort;
use std::path::{Path, PathBuf};

const HEADER: [&str; 6] = ["timestamp_ms", "open", "high", "low", "close", "volume"];

pub struct CsvCacheAdapter<'a> {
    inner: &'a dyn MarketDataPort,
    dir: PathBuf,
}

impl<'a> CsvCacheAdapter<'a> {
    pub fn new<P: AsRef<Path>>(inner: &'a dyn MarketDataPort, dir: P) -> Self {
        Self {
            inner,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn cache_path(&self, pair: &str, timeframe: &str, since_ms: i64) -> PathBuf {
        let pair = pair.replace('/', "_");
        self.dir.join(format!("{pair}_{timeframe}_{since_ms}.csv"))
    }

    fn read_cache(path: &Path) -> Result<Vec<Bar>, PairtraderError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut bars = Vec::new();
        for record in reader.records() {
            let record = record?;
            bars.push(Self::parse_record(&record)?);
        }
        Ok(bars)
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Bar, PairtraderError> {
        if record.len() != HEADER.len() {
            return Err(PairtraderError::InvalidInput {
                reason: format!("cached row has {} fields, expected 6", record.len()),
            });
        }
        let field = |i: usize| -> Result<f64, PairtraderError> {
            record[i].parse().map_err(|_| PairtraderError::InvalidInput {
                reason: format!("cached row has non-numeric field: {}", &record[i]),
            })
        };
        let timestamp_ms =
            record[0]
                .parse()
                .map_err(|_| PairtraderError::InvalidInput {
                    reason: format!("cached row has invalid timestamp: {}", &record[0]),
                })?;
        Ok(Bar {
            timestamp_ms,
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        })
    }

    fn write_cache(path: &Path, bars: &[Bar]) -> Result<(), PairtraderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADER)?;
        for bar in bars {
            writer.write_record([
                bar.timestamp_ms.to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl MarketDataPort for CsvCacheAdapter<'_> {
    fn fetch_ohlcv(
        &self,
        pair: &str,
        timeframe: &str,
        since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError> {
        let Some(since) = since_ms else {
            return self.inner.fetch_ohlcv(pair, timeframe, since_ms, limit);
        };

        let path = self.cache_path(pair, timeframe, since);
        if path.exists() {
            tracing::debug!(path = %path.display(), "serving candles from cache");
            return Self::read_cache(&path);
        }

        let bars = self.inner.fetch_ohlcv(pair, timeframe, since_ms, limit)?;
        Self::write_cache(&path, &bars)?;
        tracing::debug!(path = %path.display(), count = bars.len(), "cached candles");
        Ok(bars)
    }
}
