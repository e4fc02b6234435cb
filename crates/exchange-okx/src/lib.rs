//! OKX integration for the arb-collect pipeline.

pub mod collector;

pub use collector::{OkxCollector, OKX_API_URL};
