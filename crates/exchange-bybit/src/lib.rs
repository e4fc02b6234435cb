//! Bybit v5 spot integration for the arb-collect pipeline.

pub mod collector;

pub use collector::{BybitCollector, BYBIT_API_URL};
