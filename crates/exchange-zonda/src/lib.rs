//! Zonda integration for the arb-collect pipeline.

pub mod collector;

pub use collector::{ZondaCollector, ZONDA_API_URL};
