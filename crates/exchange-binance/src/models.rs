//! Raw Binance REST payloads.
//!
//! Binance returns all prices and quantities as JSON strings; conversion to
//! the core snapshot types parses them explicitly.

use arb_collect_core::{parse_f64, BookLevel, OrderBookSnapshot, PriceSnapshot, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /api/v3/exchangeInfo` response, reduced to what the mapper needs.
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub status: String,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

/// `GET /api/v3/ticker/24hr` response for one symbol.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub last_price: String,
    pub volume: String,
    pub bid_price: String,
    pub ask_price: String,
}

impl Ticker24h {
    /// Converts the stringly payload into a snapshot stamped `at`.
    pub fn into_snapshot(self, at: DateTime<Utc>) -> Result<PriceSnapshot> {
        Ok(PriceSnapshot::new(
            parse_f64("lastPrice", &self.last_price)?,
            parse_f64("volume", &self.volume)?,
            parse_f64("bidPrice", &self.bid_price)?,
            parse_f64("askPrice", &self.ask_price)?,
            at,
        ))
    }
}

/// `GET /api/v3/depth` response. Levels arrive best-first per side; that
/// ordering is preserved as-is.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Depth {
    pub last_update_id: i64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

impl Depth {
    pub fn into_snapshot(self, at: DateTime<Utc>, depth: usize) -> Result<OrderBookSnapshot> {
        Ok(OrderBookSnapshot::new(
            self.last_update_id,
            at,
            parse_levels(&self.bids)?,
            parse_levels(&self.asks)?,
        )
        .truncated(depth))
    }
}

fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|[price, qty]| Ok(BookLevel::new(parse_f64("price", price)?, parse_f64("qty", qty)?)))
        .collect()
}

/// Binance error body, returned with a non-2xx status.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}
