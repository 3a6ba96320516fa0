//! Strategy selection and parameters.

use std::str::FromStr;

use super::bar::PriceSeries;
use super::error::PairtraderError;
use super::indicator::macd::{DEFAULT_LONG, DEFAULT_SHORT, DEFAULT_SIGNAL};
use super::indicator::rsi::{DEFAULT_OVERBOUGHT, DEFAULT_OVERSOLD, DEFAULT_PERIOD};
use super::position::FeePolicy;
use super::signal::{
    MacdSignals, MajoritySignals, RsiSignals, SignalSource, SmaRsiSignals, SmaSignals,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SimpleSma,
    Rsi,
    Macd,
    SmaRsi,
    Majority,
}

impl FromStr for StrategyKind {
    type Err = PairtraderError;

    /// Names match what the dashboard and CLI expose. Unknown names fail
    /// fast, before any data is fetched.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "SimpleSMA" => Ok(StrategyKind::SimpleSma),
            "RSIStrategy" => Ok(StrategyKind::Rsi),
            "MACD" => Ok(StrategyKind::Macd),
            "SMA_RSI" => Ok(StrategyKind::SmaRsi),
            "MixStrategy" => Ok(StrategyKind::Majority),
            _ => Err(PairtraderError::InvalidStrategy { name: name.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub sma_window: usize,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub fee: FeePolicy,
}

impl StrategyConfig {
    pub fn new(kind: StrategyKind) -> Self {
        StrategyConfig {
            kind,
            sma_window: 10,
            rsi_period: DEFAULT_PERIOD,
            oversold: DEFAULT_OVERSOLD,
            overbought: DEFAULT_OVERBOUGHT,
            macd_short: DEFAULT_SHORT,
            macd_long: DEFAULT_LONG,
            macd_signal: DEFAULT_SIGNAL,
            fee: FeePolicy::None,
        }
    }

    /// Precompute the signal stream for one price series.
    pub fn build(&self, series: &PriceSeries) -> Result<Box<dyn SignalSource>, PairtraderError> {
        Ok(match self.kind {
            StrategyKind::SimpleSma => Box::new(SmaSignals::from_series(series, self.sma_window)?),
            StrategyKind::Rsi => Box::new(RsiSignals::from_series(
                series,
                self.rsi_period,
                self.oversold,
                self.overbought,
            )?),
            StrategyKind::Macd => Box::new(MacdSignals::from_series(
                series,
                self.macd_short,
                self.macd_long,
                self.macd_signal,
            )?),
            StrategyKind::SmaRsi => Box::new(SmaRsiSignals::from_series(
                series,
                self.sma_window,
                self.rsi_period,
                self.oversold,
                self.overbought,
            )?),
            StrategyKind::Majority => Box::new(MajoritySignals::new(vec![
                Box::new(SmaSignals::from_series(series, self.sma_window)?),
                Box::new(RsiSignals::from_series(
                    series,
                    self.rsi_period,
                    self.oversold,
                    self.overbought,
                )?),
                Box::new(MacdSignals::from_series(
                    series,
                    self.macd_short,
                    self.macd_long,
                    self.macd_signal,
                )?),
            ])),
        })
    }

    /// Bars needed to seed a live rolling window before the first signal.
    pub fn initial_window(&self) -> usize {
        match self.kind {
            StrategyKind::SimpleSma => self.sma_window + 1,
            StrategyKind::Rsi => self.rsi_period + 1,
            StrategyKind::Macd => self.macd_long + self.macd_signal,
            StrategyKind::SmaRsi => self.sma_window.max(self.rsi_period) + 1,
            StrategyKind::Majority => {
                (self.sma_window.max(self.rsi_period) + 1).max(self.macd_long + self.macd_signal)
            }
        }
    }
}
