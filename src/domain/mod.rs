//! Core trading logic, independent of any exchange or storage backend.

pub mod bar;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod live;
pub mod position;
pub mod signal;
pub mod strategy;
