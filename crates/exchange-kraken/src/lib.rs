//! Kraken integration for the arb-collect pipeline.

pub mod collector;

pub use collector::{KrakenCollector, KRAKEN_API_URL};
