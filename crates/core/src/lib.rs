//! Core types and contracts for the arb-collect market-data pipeline.

pub mod collector;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod series;
pub mod snapshot;
pub mod symbol;

pub use collector::{Collector, SnapshotStore};
pub use config::{AppConfig, CollectionConfig, DatabaseConfig, ExchangeConfig};
pub use config_loader::ConfigLoader;
pub use error::{parse_f64, CollectError, Result};
pub use series::{backfill, TimeSeriesOptions, SAMPLE_PACING};
pub use snapshot::{BookLevel, MarketPair, OrderBookSnapshot, PriceSnapshot};
pub use symbol::SymbolMap;
