//! Kraken REST collector.
//!
//! Kraken answers HTTP 200 with an `{error: [...], result: {...}}` envelope;
//! a non-empty error array is the failure signal. Tickers spell Bitcoin as
//! XBT and Tether as USD, so the symbol map carries the BTC→XBT and
//! USDT→USD aliases, and pairs are registered from each instrument's
//! `wsname` (`"XBT/USD"`).

use arb_collect_core::{
    backfill, parse_f64, BookLevel, CollectError, Collector, ExchangeConfig, OrderBookSnapshot,
    PriceSnapshot, Result, SymbolMap, TimeSeriesOptions,
};
use async_trait::async_trait;
use chrono::Utc;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default Kraken API base URL.
pub const KRAKEN_API_URL: &str = "https://api.kraken.com";

/// Currency aliases applied before pair lookup.
const ALIASES: &[(&str, &str)] = &[("BTC", "XBT"), ("USDT", "USD")];

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AssetPair {
    /// WebSocket name, `"XBT/USD"`. Absent for dark-pool entries.
    wsname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    /// Last trade closed: `[price, lot volume]`.
    c: Vec<String>,
    /// Volume: `[today, last 24 hours]`.
    v: Vec<String>,
    /// Best bid: `[price, whole lot volume, lot volume]`.
    b: Vec<String>,
    /// Best ask: `[price, whole lot volume, lot volume]`.
    a: Vec<String>,
}

/// Depth level: `[price, volume, timestamp]` with a numeric timestamp.
#[derive(Debug, Deserialize)]
struct Level(String, String, #[allow(dead_code)] f64);

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<Level>,
    asks: Vec<Level>,
}

/// Kraken collector.
pub struct KrakenCollector {
    http: Client,
    base_url: String,
    api_key: String,
    symbols: SymbolMap,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl KrakenCollector {
    /// Creates a collector, validating that credentials are present.
    ///
    /// # Errors
    /// Returns [`CollectError::Configuration`] when the API key or secret
    /// is empty.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        if !config.is_complete(false) {
            return Err(CollectError::Configuration(
                "kraken: API key and secret are required".to_string(),
            ));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(60u32))));

        Ok(Self {
            http,
            base_url: KRAKEN_API_URL.to_string(),
            api_key: config.api_key,
            symbols: SymbolMap::new("").with_aliases(ALIASES),
            rate_limiter,
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Number of mapped pairs; zero before initialization.
    #[must_use]
    pub fn mapped_pairs(&self) -> usize {
        self.symbols.len()
    }

    /// Issues one GET and unwraps the Kraken envelope.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectError::api(status.as_u16(), body));
        }

        let envelope = response.json::<Envelope<T>>().await?;
        if !envelope.error.is_empty() {
            return Err(CollectError::Exchange(envelope.error.join("; ")));
        }
        envelope
            .result
            .ok_or_else(|| CollectError::Parse("missing result in kraken envelope".to_string()))
    }

    fn resolve(&self, base: &str, quote: &str) -> String {
        self.symbols.resolve_or_concat(base, quote)
    }
}

#[async_trait]
impl Collector for KrakenCollector {
    fn exchange(&self) -> &'static str {
        "kraken"
    }

    async fn initialize(&mut self) -> Result<()> {
        let pairs: HashMap<String, AssetPair> = self
            .get("/0/public/AssetPairs")
            .await
            .map_err(|e| CollectError::initialization("kraken", e.to_string()))?;

        let mut symbols = SymbolMap::new("").with_aliases(ALIASES);
        for (pair_id, asset_pair) in &pairs {
            // The wsname carries the native spelling, e.g. "XBT/USD".
            let Some(wsname) = asset_pair.wsname.as_deref() else {
                continue;
            };
            if let Some((base, quote)) = wsname.split_once('/') {
                symbols.insert_pair(base, quote, pair_id.clone());
            }
        }

        tracing::info!(pairs = symbols.len(), "kraken symbol map initialized");
        self.symbols = symbols;
        Ok(())
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot> {
        let pair = self.resolve(base, quote);
        let tickers: HashMap<String, Ticker> =
            self.get(&format!("/0/public/Ticker?pair={pair}")).await?;

        // The result is keyed by Kraken's own (sometimes re-spelled) pair id.
        let ticker = tickers
            .into_values()
            .next()
            .ok_or_else(|| CollectError::data_unavailable(pair.clone()))?;

        let price = field(&ticker.c, 0, "c")?;
        let volume = field(&ticker.v, 1, "v")?;
        let bid = field(&ticker.b, 0, "b")?;
        let ask = field(&ticker.a, 0, "a")?;
        Ok(PriceSnapshot::new(price, volume, bid, ask, Utc::now()))
    }

    async fn fetch_order_book(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot> {
        let pair = self.resolve(base, quote);
        let books: HashMap<String, Depth> = self
            .get(&format!("/0/public/Depth?pair={pair}&count={depth}"))
            .await?;

        let book = books
            .into_values()
            .next()
            .ok_or_else(|| CollectError::data_unavailable(pair))?;

        // Kraken has no book sequence number on this endpoint.
        Ok(OrderBookSnapshot::new(
            0,
            Utc::now(),
            parse_levels(&book.bids)?,
            parse_levels(&book.asks)?,
        )
        .truncated(depth))
    }

    async fn fetch_price_series(
        &self,
        base: &str,
        quote: &str,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<PriceSnapshot>> {
        backfill(options, |stamp| async move {
            let mut snapshot = self.fetch_price(base, quote).await?;
            snapshot.timestamp = stamp;
            Ok(snapshot)
        })
        .await
    }

    async fn fetch_order_book_series(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<OrderBookSnapshot>> {
        backfill(options, |stamp| async move {
            let mut book = self.fetch_order_book(base, quote, depth).await?;
            book.timestamp = stamp;
            Ok(book)
        })
        .await
    }

    async fn cleanup(&mut self) {
        tracing::debug!("kraken collector cleanup");
    }
}

fn field(values: &[String], index: usize, name: &str) -> Result<f64> {
    let raw = values
        .get(index)
        .ok_or_else(|| CollectError::Parse(format!("ticker field {name}[{index}] missing")))?;
    parse_f64(name, raw)
}

fn parse_levels(raw: &[Level]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|level| {
            Ok(BookLevel::new(
                parse_f64("price", &level.0)?,
                parse_f64("volume", &level.1)?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ExchangeConfig {
        ExchangeConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
        }
    }

    async fn initialized_collector(server: &MockServer) -> KrakenCollector {
        Mock::given(method("GET"))
            .and(path("/0/public/AssetPairs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": {
                    "XXBTZUSD": {"wsname": "XBT/USD"},
                    "XETHZUSD": {"wsname": "ETH/USD"},
                    "XXBTZUSD.d": {}
                }
            })))
            .mount(server)
            .await;

        let mut collector = KrakenCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        collector.initialize().await.unwrap();
        collector
    }

    #[tokio::test]
    async fn test_initialize_parses_wsnames() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;
        // The dark-pool entry without a wsname is skipped.
        assert_eq!(collector.mapped_pairs(), 2);
    }

    #[tokio::test]
    async fn test_btc_usdt_resolves_via_aliases() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/0/public/Ticker"))
            .and(query_param("pair", "XXBTZUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": {
                    "XXBTZUSD": {
                        "c": ["63301.5", "0.01"],
                        "v": ["120.5", "2400.8"],
                        "b": ["63301.0", "1", "1.0"],
                        "a": ["63302.0", "1", "1.0"]
                    }
                }
            })))
            .mount(&server)
            .await;

        // Canonical BTC/USDT maps onto the XBT/USD instrument.
        let snap = collector.fetch_price("BTC", "USDT").await.unwrap();
        assert_eq!(snap.price, 63301.5);
        assert_eq!(snap.volume_24h, 2400.8); // 24h entry, not today's
        assert_eq!(snap.bid, 63301.0);
        assert_eq!(snap.ask, 63302.0);
    }

    #[tokio::test]
    async fn test_error_array_is_exchange_error() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/0/public/Ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": ["EQuery:Unknown asset pair"],
                "result": null
            })))
            .mount(&server)
            .await;

        let err = collector.fetch_price("XYZ", "USDT").await.unwrap_err();
        assert!(matches!(err, CollectError::Exchange(_)));
        assert!(err.to_string().contains("Unknown asset pair"));
    }

    #[tokio::test]
    async fn test_initialize_network_failure_is_initialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/0/public/AssetPairs"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let mut collector = KrakenCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        assert!(matches!(
            collector.initialize().await.unwrap_err(),
            CollectError::Initialization { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_order_book_parses_mixed_level_tuples() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/0/public/Depth"))
            .and(query_param("count", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": {
                    "XXBTZUSD": {
                        "bids": [["63301.0", "0.5", 1711111111], ["63300.5", "1.1", 1711111110]],
                        "asks": [["63302.0", "0.4", 1711111112], ["63302.5", "0.9", 1711111113]]
                    }
                }
            })))
            .mount(&server)
            .await;

        let book = collector.fetch_order_book("BTC", "USD", 2).await.unwrap();
        assert_eq!(book.best_bid().unwrap().price, 63301.0);
        assert_eq!(book.best_ask().unwrap().price, 63302.0);
        assert_eq!(book.bids[1].quantity, 1.1);
    }

    #[tokio::test]
    async fn test_unmapped_pair_falls_back_to_concatenation() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        // DOGE has no mapping and no alias: resolved as "DOGEUSD" via
        // the USDT→USD alias plus empty-separator concatenation.
        Mock::given(method("GET"))
            .and(path("/0/public/Ticker"))
            .and(query_param("pair", "DOGEUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": [],
                "result": {
                    "DOGEUSD": {
                        "c": ["0.15", "100"],
                        "v": ["10", "20"],
                        "b": ["0.149", "1", "1"],
                        "a": ["0.151", "1", "1"]
                    }
                }
            })))
            .mount(&server)
            .await;

        let snap = collector.fetch_price("DOGE", "USDT").await.unwrap();
        assert_eq!(snap.price, 0.15);
    }
}
