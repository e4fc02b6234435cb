//! Zonda (formerly BitBay) REST collector.
//!
//! Zonda answers HTTP 200 with a `status` field (`"Ok"` or `"Fail"`, the
//! latter with an `errors` array). The ticker endpoint carries no 24h
//! volume, so a quote takes two sequential calls: `/trading/ticker/{pair}`
//! and `/trading/stats/{pair}`. Pair identifiers are dash-separated
//! (`BTC-PLN`).

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

/// Default Zonda public API base URL.
pub const ZONDA_API_URL: &str = "https://api.zondacrypto.exchange/rest";

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct Status {
    status: String,
    #[serde(default)]
    errors: Vec<String>,
}

impl Status {
    fn check(&self) -> Result<()> {
        if self.status == "Ok" {
            Ok(())
        } else {
            Err(CollectError::Exchange(format!(
                "status {}: {}",
                self.status,
                self.errors.join("; ")
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerListResponse {
    #[serde(flatten)]
    status: Status,
    items: Option<HashMap<String, TickerItem>>,
}

#[derive(Debug, Deserialize)]
struct TickerItem {
    market: Market,
}

#[derive(Debug, Deserialize)]
struct Market {
    code: String,
    first: Currency,
    second: Currency,
}

#[derive(Debug, Deserialize)]
struct Currency {
    currency: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(flatten)]
    status: Status,
    ticker: Option<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    rate: String,
    highest_bid: String,
    lowest_ask: String,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(flatten)]
    status: Status,
    stats: Option<Stats>,
}

#[derive(Debug, Deserialize)]
struct Stats {
    /// 24h volume in base units.
    v: String,
}

/// Order-book entries carry `ra` (rate) and `ca` (current amount).
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(flatten)]
    status: Status,
    #[serde(default)]
    buy: Vec<BookEntry>,
    #[serde(default)]
    sell: Vec<BookEntry>,
    #[serde(default, rename = "seqNo")]
    seq_no: i64,
}

#[derive(Debug, Deserialize)]
struct BookEntry {
    ra: String,
    ca: String,
}

/// Zonda collector.
pub struct ZondaCollector {
    http: Client,
    base_url: String,
    api_key: String,
    symbols: SymbolMap,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl ZondaCollector {
    /// Creates a collector, validating that credentials are present.
    ///
    /// # Errors
    /// Returns [`CollectError::Configuration`] when the API key or secret
    /// is empty.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        if !config.is_complete(false) {
            return Err(CollectError::Configuration(
                "zonda: API key and secret are required".to_string(),
            ));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(60u32))));

        Ok(Self {
            http,
            base_url: ZONDA_API_URL.to_string(),
            api_key: config.api_key,
            symbols: SymbolMap::new("-"),
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

        Ok(response.json::<T>().await?)
    }

    fn resolve(&self, base: &str, quote: &str) -> String {
        self.symbols.resolve_or_concat(base, quote)
    }
}

#[async_trait]
impl Collector for ZondaCollector {
    fn exchange(&self) -> &'static str {
        "zonda"
    }

    async fn initialize(&mut self) -> Result<()> {
        let tickers: TickerListResponse = self
            .get("/trading/ticker")
            .await
            .map_err(|e| CollectError::initialization("zonda", e.to_string()))?;
        tickers
            .status
            .check()
            .map_err(|e| CollectError::initialization("zonda", e.to_string()))?;

        let mut symbols = SymbolMap::new("-");
        for item in tickers.items.unwrap_or_default().into_values() {
            symbols.insert_pair(
                &item.market.first.currency,
                &item.market.second.currency,
                item.market.code,
            );
        }

        tracing::info!(pairs = symbols.len(), "zonda symbol map initialized");
        self.symbols = symbols;
        Ok(())
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot> {
        let pair = self.resolve(base, quote);

        let ticker_response: TickerResponse =
            self.get(&format!("/trading/ticker/{pair}")).await?;
        ticker_response.status.check()?;
        let ticker = ticker_response
            .ticker
            .ok_or_else(|| CollectError::data_unavailable(pair.clone()))?;

        // 24h volume lives on a separate endpoint.
        let stats_response: StatsResponse = self.get(&format!("/trading/stats/{pair}")).await?;
        stats_response.status.check()?;
        let stats = stats_response
            .stats
            .ok_or_else(|| CollectError::data_unavailable(pair.clone()))?;

        Ok(PriceSnapshot::new(
            parse_f64("rate", &ticker.rate)?,
            parse_f64("v", &stats.v)?,
            parse_f64("highestBid", &ticker.highest_bid)?,
            parse_f64("lowestAsk", &ticker.lowest_ask)?,
            Utc::now(),
        ))
    }

    async fn fetch_order_book(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot> {
        let pair = self.resolve(base, quote);
        let book: BookResponse = self
            .get(&format!("/trading/orderbook-limited/{pair}/{depth}"))
            .await?;
        book.status.check()?;

        Ok(OrderBookSnapshot::new(
            book.seq_no,
            Utc::now(),
            parse_entries(&book.buy)?,
            parse_entries(&book.sell)?,
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
        tracing::debug!("zonda collector cleanup");
    }
}

fn parse_entries(raw: &[BookEntry]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|entry| {
            Ok(BookLevel::new(
                parse_f64("ra", &entry.ra)?,
                parse_f64("ca", &entry.ca)?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ExchangeConfig {
        ExchangeConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
        }
    }

    async fn initialized_collector(server: &MockServer) -> ZondaCollector {
        Mock::given(method("GET"))
            .and(path("/trading/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Ok",
                "items": {
                    "BTC-PLN": {
                        "market": {
                            "code": "BTC-PLN",
                            "first": {"currency": "BTC"},
                            "second": {"currency": "PLN"}
                        }
                    },
                    "ETH-PLN": {
                        "market": {
                            "code": "ETH-PLN",
                            "first": {"currency": "ETH"},
                            "second": {"currency": "PLN"}
                        }
                    }
                }
            })))
            .mount(server)
            .await;

        let mut collector = ZondaCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        collector.initialize().await.unwrap();
        collector
    }

    #[tokio::test]
    async fn test_initialize_builds_map_from_items() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;
        assert_eq!(collector.mapped_pairs(), 2);
    }

    #[tokio::test]
    async fn test_initialize_fail_status_is_initialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trading/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Fail",
                "errors": ["MARKET_NOT_AVAILABLE"]
            })))
            .mount(&server)
            .await;

        let mut collector = ZondaCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        let err = collector.initialize().await.unwrap_err();
        assert!(matches!(err, CollectError::Initialization { .. }));
        assert!(err.to_string().contains("MARKET_NOT_AVAILABLE"));
    }

    #[tokio::test]
    async fn test_fetch_price_combines_ticker_and_stats() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/trading/ticker/BTC-PLN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Ok",
                "ticker": {
                    "rate": "251000.55",
                    "highestBid": "250990.00",
                    "lowestAsk": "251010.00"
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/trading/stats/BTC-PLN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Ok",
                "stats": {"v": "42.7"}
            })))
            .mount(&server)
            .await;

        let snap = collector.fetch_price("BTC", "PLN").await.unwrap();
        assert_eq!(snap.price, 251000.55);
        assert_eq!(snap.volume_24h, 42.7);
        assert_eq!(snap.bid, 250990.00);
        assert_eq!(snap.ask, 251010.00);
    }

    #[tokio::test]
    async fn test_fail_status_on_ticker_is_exchange_error() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/trading/ticker/XYZ-PLN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Fail",
                "errors": ["TICKER_NOT_FOUND"]
            })))
            .mount(&server)
            .await;

        let err = collector.fetch_price("XYZ", "PLN").await.unwrap_err();
        assert!(matches!(err, CollectError::Exchange(_)));
    }

    #[tokio::test]
    async fn test_fetch_order_book_ra_ca_entries() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/trading/orderbook-limited/BTC-PLN/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Ok",
                "buy": [
                    {"ra": "250990.00", "ca": "0.30"},
                    {"ra": "250980.00", "ca": "0.75"}
                ],
                "sell": [
                    {"ra": "251010.00", "ca": "0.20"},
                    {"ra": "251020.00", "ca": "0.50"}
                ],
                "seqNo": 4242
            })))
            .mount(&server)
            .await;

        let book = collector.fetch_order_book("BTC", "PLN", 2).await.unwrap();
        assert_eq!(book.last_update_id, 4242);
        assert_eq!(book.best_bid().unwrap().price, 250990.00);
        assert_eq!(book.best_ask().unwrap().quantity, 0.20);
    }
}
