//! Binance spot integration for the arb-collect pipeline.
//!
//! Public REST endpoints only: `exchangeInfo` for the symbol map,
//! `ticker/24hr` for quotes, `depth` for order books. Requests carry the
//! `X-MBX-APIKEY` header; failures arrive as HTTP error statuses with a
//! `{code, msg}` body.

pub mod collector;
pub mod models;

pub use collector::{BinanceCollector, BINANCE_API_URL};
