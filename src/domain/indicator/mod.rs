//! Technical indicator calculations.
//!
//! Indicators are pure transforms: given a close-price column they return an
//! [`IndicatorSeries`] of equal length. Warm-up entries are `None`, which is
//! deliberately distinct from any numeric value; downstream signal generation
//! treats `None` as Hold.

pub mod macd;
pub mod rsi;
pub mod sma;

pub use macd::macd;
pub use rsi::rsi;
pub use sma::sma;

use super::error::PairtraderError;

/// A derived series index-aligned one-to-one with a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn from_values(values: Vec<Option<f64>>) -> Self {
        IndicatorSeries { values }
    }

    /// Value at `index`, or `None` when out of range or still warming up.
    pub fn at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// Shared input validation: indicators reject empty input and non-finite
/// closes rather than letting NaN propagate into signal comparisons.
pub(crate) fn validate_closes(closes: &[f64], need: usize) -> Result<(), PairtraderError> {
    if closes.is_empty() {
        return Err(PairtraderError::InsufficientData { have: 0, need });
    }
    if let Some(pos) = closes.iter().position(|c| !c.is_finite()) {
        return Err(PairtraderError::InvalidInput {
            reason: format!("non-finite close at index {pos}"),
        });
    }
    Ok(())
}
