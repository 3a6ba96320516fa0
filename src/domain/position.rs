//! Position and portfolio equity tracking.
//!
//! A book holds at most one long position and a single equity figure.
//! Equity only moves when an open position is closed, using the
//! percentage-of-equity re-investment model: the closed trade's return is
//! applied to the whole current equity, not to a fixed position size.

use tracing::{info, warn};

/// Fee adjustment applied when a position is closed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FeePolicy {
    /// No fees.
    #[default]
    None,
    /// Subtract `entry_price * rate` from the price delta before applying the
    /// return.
    ProportionalToEntry(f64),
    /// Subtract a flat cost from equity after applying the return.
    PerTradeFromEquity(f64),
}

/// One completed buy-then-sell round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub exit_timestamp_ms: i64,
    pub entry_price: f64,
    pub equity_after: f64,
    pub price_delta: f64,
}

#[derive(Debug, Clone)]
pub struct PositionBook {
    initial_equity: f64,
    equity: f64,
    entry_price: Option<f64>,
    ledger: Vec<TradeRecord>,
    fee: FeePolicy,
}

impl PositionBook {
    pub fn new(initial_equity: f64, fee: FeePolicy) -> Self {
        PositionBook {
            initial_equity,
            equity: initial_equity,
            entry_price: None,
            ledger: Vec::new(),
            fee,
        }
    }

    pub fn is_open(&self) -> bool {
        self.entry_price.is_some()
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    pub fn ledger(&self) -> &[TradeRecord] {
        &self.ledger
    }

    /// Open a long position at `price`. A buy while already long is a
    /// logged no-op; returns whether the position was opened.
    pub fn open(&mut self, price: f64) -> bool {
        if self.is_open() {
            warn!(price, "buy while already long, ignoring");
            return false;
        }
        info!(price, "opening position");
        self.entry_price = Some(price);
        true
    }

    /// Close the position at `price`, realize the return into equity and
    /// record the trade. A sell while flat is a no-op; returns the realized
    /// price delta when a trade actually closed.
    pub fn close(&mut self, exit_timestamp_ms: i64, price: f64) -> Option<f64> {
        let entry = match self.entry_price {
            Some(entry) => entry,
            None => {
                warn!(price, "sell while flat, ignoring");
                return None;
            }
        };

        let mut delta = price - entry;
        if let FeePolicy::ProportionalToEntry(rate) = self.fee {
            delta -= entry * rate;
        }

        self.equity += self.equity * delta / entry;
        if let FeePolicy::PerTradeFromEquity(cost) = self.fee {
            self.equity -= cost;
        }

        self.entry_price = None;
        self.ledger.push(TradeRecord {
            exit_timestamp_ms,
            entry_price: entry,
            equity_after: self.equity,
            price_delta: delta,
        });
        info!(price, equity = self.equity, "closing position");
        Some(delta)
    }
}
