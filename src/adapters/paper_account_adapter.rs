//! Simulated exchange account.
//!
//! Balances come from the `[account]` config section and never change; order
//! placement only records the order and returns a synthetic confirmation. The
//! engine tracks simulated equity itself, so this adapter exists to exercise
//! the same code paths a real exchange account would.

use crate::domain::error::PairtraderError;
use crate::ports::account_port::{AccountPort, OrderConfirmation, Side};
use crate::ports::config_port::ConfigPort;
use std::cell::RefCell;

pub struct PaperAccountAdapter {
    quote_balance: f64,
    base_balance: f64,
    orders: RefCell<Vec<OrderConfirmation>>,
}

impl PaperAccountAdapter {
    pub fn new(quote_balance: f64, base_balance: f64) -> Self {
        Self {
            quote_balance,
            base_balance,
            orders: RefCell::new(Vec::new()),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Self {
        Self::new(
            config.get_double("account", "quote_balance", 1000.0),
            config.get_double("account", "base_balance", 0.0),
        )
    }

    pub fn orders(&self) -> Vec<OrderConfirmation> {
        self.orders.borrow().clone()
    }
}

impl AccountPort for PaperAccountAdapter {
    fn free_quantity(&self, _pair: &str, side: Side) -> Result<f64, PairtraderError> {
        Ok(match side {
            Side::Buy => self.quote_balance,
            Side::Sell => self.base_balance,
        })
    }

    fn place_order(
        &self,
        pair: &str,
        side: Side,
        amount: f64,
    ) -> Result<OrderConfirmation, PairtraderError> {
        if amount <= 0.0 {
            return Err(PairtraderError::InvalidInput {
                reason: format!("order amount must be positive, got {amount}"),
            });
        }
        let confirmation = OrderConfirmation {
            pair: pair.to_string(),
            side,
            amount,
        };
        tracing::info!(pair, side = side.as_str(), amount, "paper order placed");
        self.orders.borrow_mut().push(confirmation.clone());
        Ok(confirmation)
    }
}
