//! Relative Strength Index.
//!
//! RS = mean(gains over period) / mean(losses over period)
//! RSI = 100 - 100 / (1 + RS), with RSI = 100 when the loss mean is zero.
//!
//! Warm-up: the first `period` indices are undefined (a delta needs two
//! closes, so `period` deltas span `period + 1` bars).

use super::{validate_closes, IndicatorSeries};
use crate::domain::error::PairtraderError;

pub const DEFAULT_PERIOD: usize = 14;
pub const DEFAULT_OVERSOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

pub fn rsi(closes: &[f64], period: usize) -> Result<IndicatorSeries, PairtraderError> {
    if period == 0 {
        return Err(PairtraderError::InvalidInput {
            reason: "rsi period must be at least 1".into(),
        });
    }
    validate_closes(closes, period + 1)?;

    let mut gains = Vec::with_capacity(closes.len().saturating_sub(1));
    let mut losses = Vec::with_capacity(closes.len().saturating_sub(1));
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut values = vec![None; closes.len()];
    for i in period..closes.len() {
        // deltas ending at bar i are gains[i - period .. i]
        let gain_avg: f64 = gains[i - period..i].iter().sum::<f64>() / period as f64;
        let loss_avg: f64 = losses[i - period..i].iter().sum::<f64>() / period as f64;

        let value = if loss_avg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain_avg / loss_avg)
        };
        values[i] = Some(value);
    }

    Ok(IndicatorSeries::from_values(values))
}
