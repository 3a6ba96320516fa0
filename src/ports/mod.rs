//! Port traits implemented by concrete adapters.

pub mod account_port;
pub mod config_port;
pub mod market_data_port;
