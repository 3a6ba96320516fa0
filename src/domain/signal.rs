//! Signal generation from indicator series.
//!
//! Every generator follows the same one-bar-lag convention: the signal for
//! bar `index` is derived from indicator values at `index - 1` compared
//! against the close at `index`. An indicator value that is still warming up
//! yields Hold, never a comparison against a stand-in number.

use super::bar::PriceSeries;
use super::error::PairtraderError;
use super::indicator::{self, IndicatorSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// A per-bar signal stream precomputed over one price series.
///
/// `warmup` is the first index the backtest loop should visit; `signal_at`
/// must return Hold for anything earlier.
pub trait SignalSource {
    fn warmup(&self) -> usize;
    fn signal_at(&self, index: usize) -> Signal;
}

/// Close versus prior SMA: Buy above, Sell below, equality is Hold.
pub struct SmaSignals {
    closes: Vec<f64>,
    sma: IndicatorSeries,
    window: usize,
}

impl SmaSignals {
    pub fn from_series(series: &PriceSeries, window: usize) -> Result<Self, PairtraderError> {
        let closes = series.closes();
        let sma = indicator::sma(&closes, window)?;
        Ok(SmaSignals { closes, sma, window })
    }
}

impl SignalSource for SmaSignals {
    fn warmup(&self) -> usize {
        self.window
    }

    fn signal_at(&self, index: usize) -> Signal {
        if index < self.warmup() || index >= self.closes.len() {
            return Signal::Hold;
        }
        let Some(prev_sma) = self.sma.at(index - 1) else {
            return Signal::Hold;
        };
        let close = self.closes[index];
        if close > prev_sma {
            Signal::Buy
        } else if close < prev_sma {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

/// Prior RSI against oversold/overbought thresholds.
pub struct RsiSignals {
    rsi: IndicatorSeries,
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiSignals {
    pub fn from_series(
        series: &PriceSeries,
        period: usize,
        oversold: f64,
        overbought: f64,
    ) -> Result<Self, PairtraderError> {
        let rsi = indicator::rsi(&series.closes(), period)?;
        Ok(RsiSignals {
            rsi,
            period,
            oversold,
            overbought,
        })
    }
}

impl SignalSource for RsiSignals {
    fn warmup(&self) -> usize {
        self.period
    }

    fn signal_at(&self, index: usize) -> Signal {
        if index < self.warmup() {
            return Signal::Hold;
        }
        let Some(prev_rsi) = self.rsi.at(index.wrapping_sub(1)) else {
            return Signal::Hold;
        };
        if prev_rsi < self.oversold {
            Signal::Buy
        } else if prev_rsi > self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

/// Sign of the prior MACD delta.
pub struct MacdSignals {
    delta: IndicatorSeries,
    long: usize,
    signal: usize,
}

impl MacdSignals {
    pub fn from_series(
        series: &PriceSeries,
        short: usize,
        long: usize,
        signal: usize,
    ) -> Result<Self, PairtraderError> {
        let delta = indicator::macd(&series.closes(), short, long, signal)?;
        Ok(MacdSignals {
            delta,
            long,
            signal,
        })
    }
}

impl SignalSource for MacdSignals {
    fn warmup(&self) -> usize {
        self.long + self.signal
    }

    fn signal_at(&self, index: usize) -> Signal {
        if index < self.warmup() {
            return Signal::Hold;
        }
        let Some(prev_delta) = self.delta.at(index.wrapping_sub(1)) else {
            return Signal::Hold;
        };
        if prev_delta > 0.0 {
            Signal::Buy
        } else if prev_delta < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

/// SMA and RSI in agreement, composed rather than inherited: the combiner
/// holds an independent instance of each member and only acts when both
/// report the same non-Hold signal.
pub struct SmaRsiSignals {
    sma: SmaSignals,
    rsi: RsiSignals,
}

impl SmaRsiSignals {
    pub fn from_series(
        series: &PriceSeries,
        sma_window: usize,
        rsi_period: usize,
        oversold: f64,
        overbought: f64,
    ) -> Result<Self, PairtraderError> {
        Ok(SmaRsiSignals {
            sma: SmaSignals::from_series(series, sma_window)?,
            rsi: RsiSignals::from_series(series, rsi_period, oversold, overbought)?,
        })
    }
}

impl SignalSource for SmaRsiSignals {
    fn warmup(&self) -> usize {
        self.rsi.warmup()
    }

    fn signal_at(&self, index: usize) -> Signal {
        match (self.sma.signal_at(index), self.rsi.signal_at(index)) {
            (Signal::Buy, Signal::Buy) => Signal::Buy,
            (Signal::Sell, Signal::Sell) => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}

/// Majority vote across SMA, RSI and MACD: at least 2 of 3 must agree,
/// otherwise Hold. Partial agreement (1 of 3) never trades.
pub struct MajoritySignals {
    members: Vec<Box<dyn SignalSource>>,
}

impl MajoritySignals {
    pub fn new(members: Vec<Box<dyn SignalSource>>) -> Self {
        MajoritySignals { members }
    }
}

impl SignalSource for MajoritySignals {
    fn warmup(&self) -> usize {
        self.members.iter().map(|m| m.warmup()).max().unwrap_or(0)
    }

    fn signal_at(&self, index: usize) -> Signal {
        let mut buys = 0;
        let mut sells = 0;
        for member in &self.members {
            match member.signal_at(index) {
                Signal::Buy => buys += 1,
                Signal::Sell => sells += 1,
                Signal::Hold => {}
            }
        }
        if buys >= 2 {
            Signal::Buy
        } else if sells >= 2 {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
