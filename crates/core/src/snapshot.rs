//! Point-in-time market data snapshots and the market-pair catalog entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time quote for a trading pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Last traded price.
    pub price: f64,
    /// Rolling 24h traded volume in base units.
    pub volume_24h: f64,
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// When this quote is considered taken. For backfilled series this is
    /// the intended grid timestamp, not the response time.
    pub timestamp: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(price: f64, volume_24h: f64, bid: f64, ask: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            price,
            volume_24h,
            bid,
            ask,
            timestamp,
        }
    }

    /// Absolute bid/ask spread.
    #[must_use]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// One price level on a side of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// Notional value of this level.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Depth snapshot of an order book.
///
/// Both sides keep the exchange's own price-priority ordering: index 0 is
/// the best bid / best ask. The collector never re-sorts levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Exchange-reported book sequence number, 0 where the exchange has none.
    pub last_update_id: i64,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(
        last_update_id: i64,
        timestamp: DateTime<Utc>,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
    ) -> Self {
        Self {
            last_update_id,
            timestamp,
            bids,
            asks,
        }
    }

    /// Best bid, if the side is non-empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    /// Best ask, if the side is non-empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Truncates both sides to at most `depth` levels, preserving order.
    #[must_use]
    pub fn truncated(mut self, depth: usize) -> Self {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
        self
    }
}

/// Active trading pair loaded from storage, joined with its market.
///
/// Read-only for the duration of a collection run; the pipeline never
/// mutates the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPair {
    /// Storage identifier of the pair row.
    pub id: i64,
    /// Canonical base currency (e.g. "BTC").
    pub base_currency: String,
    /// Canonical quote currency (e.g. "USDT").
    pub quote_currency: String,
    /// Storage identifier of the market (exchange) row.
    pub market_id: i64,
    /// Storage identifier of the coin row.
    pub coin_id: i64,
    /// Exchange name as stored ("Binance", "Kraken", ...). Matched
    /// case-insensitively against collector names.
    pub market_name: String,
}

impl MarketPair {
    /// Canonical `BASE/QUOTE` spelling, used in logs and summaries.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}/{}", self.base_currency, self.quote_currency)
    }
}
