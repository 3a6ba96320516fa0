//! Market data access port trait.

use crate::domain::bar::Bar;
use crate::domain::error::PairtraderError;

pub trait MarketDataPort {
    /// Fetch OHLCV candles for a pair/timeframe, oldest first.
    ///
    /// `since_ms` restricts the range to candles at or after that timestamp;
    /// `limit` caps the number of candles returned (most recent when no
    /// `since_ms` is given, matching exchange kline semantics).
    fn fetch_ohlcv(
        &self,
        pair: &str,
        timeframe: &str,
        since_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, PairtraderError>;
}
