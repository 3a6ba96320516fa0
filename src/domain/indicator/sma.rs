//! Simple moving average.

use super::{validate_closes, IndicatorSeries};
use crate::domain::error::PairtraderError;

/// Rolling arithmetic mean of the last `window` closes ending at each index.
/// The first `window - 1` entries are undefined.
pub fn sma(closes: &[f64], window: usize) -> Result<IndicatorSeries, PairtraderError> {
    if window == 0 {
        return Err(PairtraderError::InvalidInput {
            reason: "sma window must be at least 1".into(),
        });
    }
    validate_closes(closes, window)?;

    let mut values = Vec::with_capacity(closes.len());
    let mut running = 0.0;
    for (i, close) in closes.iter().enumerate() {
        running += close;
        if i >= window {
            running -= closes[i - window];
        }
        if i + 1 >= window {
            values.push(Some(running / window as f64));
        } else {
            values.push(None);
        }
    }

    Ok(IndicatorSeries::from_values(values))
}
