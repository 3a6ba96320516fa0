//! MACD delta (MACD line minus its signal line).
//!
//! MACD Line = EMA(short) - EMA(long)
//! Signal Line = EMA(signal) of the MACD line
//! Output = MACD Line - Signal Line
//!
//! EMAs use the `adjust=false` recurrence seeded with the first value, so the
//! series is numerically defined from index 0. It is unreliable before
//! `long + signal` bars; the signal generator enforces that warm-up.

use super::{validate_closes, IndicatorSeries};
use crate::domain::error::PairtraderError;

pub const DEFAULT_SHORT: usize = 12;
pub const DEFAULT_LONG: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn macd(
    closes: &[f64],
    short: usize,
    long: usize,
    signal: usize,
) -> Result<IndicatorSeries, PairtraderError> {
    if short == 0 || long == 0 || signal == 0 {
        return Err(PairtraderError::InvalidInput {
            reason: "macd spans must be at least 1".into(),
        });
    }
    validate_closes(closes, long + signal)?;

    let short_ema = ema(closes, short);
    let long_ema = ema(closes, long);

    let macd_line: Vec<f64> = short_ema
        .iter()
        .zip(&long_ema)
        .map(|(s, l)| s - l)
        .collect();
    let signal_line = ema(&macd_line, signal);

    let values = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| Some(m - s))
        .collect();

    Ok(IndicatorSeries::from_values(values))
}

/// Exponential moving average, alpha = 2 / (span + 1), seeded with the first
/// value.
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = 0.0;
    for (i, value) in values.iter().enumerate() {
        current = if i == 0 {
            *value
        } else {
            value * alpha + current * (1.0 - alpha)
        };
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_seeds_with_first_value() {
        let values = [10.0, 20.0];
        let out = ema(&values, 3);
        assert_relative_eq!(out[0], 10.0);
        // alpha = 0.5: 20 * 0.5 + 10 * 0.5
        assert_relative_eq!(out[1], 15.0);
    }

    #[test]
    fn macd_defined_from_index_zero() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = macd(&closes, 3, 5, 2).unwrap();
        assert_eq!(series.len(), 10);
        assert!(series.values().iter().all(|v| v.is_some()));
    }

    #[test]
    fn macd_zero_on_constant_series() {
        let closes = [100.0; 12];
        let series = macd(&closes, 3, 5, 2).unwrap();
        for value in series.values().iter().flatten() {
            assert_relative_eq!(*value, 0.0);
        }
    }

    #[test]
    fn macd_positive_in_sustained_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let series = macd(&closes, DEFAULT_SHORT, DEFAULT_LONG, DEFAULT_SIGNAL).unwrap();
        let warmup = DEFAULT_LONG + DEFAULT_SIGNAL;
        for i in warmup..closes.len() {
            assert!(series.at(i).unwrap() > 0.0, "index {i} should be positive");
        }
    }

    #[test]
    fn macd_empty_input_fails() {
        assert!(matches!(
            macd(&[], 12, 26, 9),
            Err(PairtraderError::InsufficientData { .. })
        ));
    }

    #[test]
    fn macd_zero_span_fails() {
        for (s, l, g) in [(0, 26, 9), (12, 0, 9), (12, 26, 0)] {
            assert!(matches!(
                macd(&[100.0, 101.0], s, l, g),
                Err(PairtraderError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn macd_default_constants() {
        assert_eq!(DEFAULT_SHORT, 12);
        assert_eq!(DEFAULT_LONG, 26);
        assert_eq!(DEFAULT_SIGNAL, 9);
    }
}
