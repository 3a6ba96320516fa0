//! Concrete implementations of the port traits.

pub mod csv_cache_adapter;
pub mod file_config_adapter;
pub mod http_exchange_adapter;
pub mod paper_account_adapter;
