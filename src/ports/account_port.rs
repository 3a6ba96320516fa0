//! Account access port trait.

use crate::domain::error::PairtraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub pair: String,
    pub side: Side,
    pub amount: f64,
}

pub trait AccountPort {
    /// Free quantity available for the requested trade side: quote currency
    /// for a buy, base currency for a sell.
    fn free_quantity(&self, pair: &str, side: Side) -> Result<f64, PairtraderError>;

    /// Place a market order. Only invoked when order placement is enabled
    /// at runtime; the engine otherwise simulates fills.
    fn place_order(
        &self,
        pair: &str,
        side: Side,
        amount: f64,
    ) -> Result<OrderConfirmation, PairtraderError>;
}
