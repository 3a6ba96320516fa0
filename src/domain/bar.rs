//! OHLCV bar and price series representation.
//!
//! A `PriceSeries` holds the bars for one (pair, timeframe) in strictly
//! increasing timestamp order. Batch ingest rejects out-of-order input;
//! live mode appends one bar at a time and re-deduplicates, keeping the
//! latest value for a given timestamp.

use chrono::{DateTime, Utc};

use super::error::PairtraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

#[derive(Debug, Clone)]
pub struct PriceSeries {
    pair: String,
    timeframe: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(pair: &str, timeframe: &str) -> Self {
        PriceSeries {
            pair: pair.to_string(),
            timeframe: timeframe.to_string(),
            bars: Vec::new(),
        }
    }

    /// Build a series from a batch of bars.
    ///
    /// Input must already be in ascending timestamp order; a bar older than
    /// its predecessor is a `NonMonotonic` error. Equal timestamps are
    /// deduplicated, keeping the later occurrence.
    pub fn from_bars(
        pair: &str,
        timeframe: &str,
        bars: Vec<Bar>,
    ) -> Result<Self, PairtraderError> {
        let mut series = PriceSeries::new(pair, timeframe);
        for bar in bars {
            match series.bars.last() {
                Some(last) if bar.timestamp_ms < last.timestamp_ms => {
                    return Err(PairtraderError::NonMonotonic {
                        timestamp_ms: bar.timestamp_ms,
                    });
                }
                Some(last) if bar.timestamp_ms == last.timestamp_ms => {
                    *series.bars.last_mut().unwrap() = bar;
                }
                _ => series.bars.push(bar),
            }
        }
        Ok(series)
    }

    /// Append a bar, keeping the series sorted and deduplicated.
    ///
    /// A bar with an already-seen timestamp replaces the stored one, so
    /// appending the same bar twice is a no-op the second time.
    pub fn append(&mut self, bar: Bar) {
        match self.bars.binary_search_by_key(&bar.timestamp_ms, |b| b.timestamp_ms) {
            Ok(pos) => self.bars[pos] = bar,
            Err(pos) => self.bars.insert(pos, bar),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
