//! Binance spot REST collector with rate limiting.

use crate::models::{ApiError, Depth, ExchangeInfo, Ticker24h};
use arb_collect_core::{
    backfill, CollectError, Collector, ExchangeConfig, OrderBookSnapshot, PriceSnapshot, Result,
    SymbolMap, TimeSeriesOptions,
};
use async_trait::async_trait;
use chrono::Utc;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Default Binance spot API base URL.
pub const BINANCE_API_URL: &str = "https://api.binance.com";

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot collector.
///
/// Binance signals failures via HTTP status codes with a `{code, msg}`
/// body; symbols are spelled as plain concatenation (`BTCUSDT`).
pub struct BinanceCollector {
    http: Client,
    base_url: String,
    api_key: String,
    symbols: SymbolMap,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl BinanceCollector {
    /// Creates a collector, validating that credentials are present.
    ///
    /// # Errors
    /// Returns [`CollectError::Configuration`] when the API key or secret
    /// is empty.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        if !config.is_complete(false) {
            return Err(CollectError::Configuration(
                "binance: API key and secret are required".to_string(),
            ));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(1200u32))));

        Ok(Self {
            http,
            base_url: BINANCE_API_URL.to_string(),
            api_key: config.api_key,
            symbols: SymbolMap::new(""),
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

    /// Waits for the rate limit and issues one GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map_or(body, |e| format!("{} (code {})", e.msg, e.code));
            return Err(CollectError::api(status.as_u16(), message));
        }

        Ok(response.json::<T>().await?)
    }

    fn resolve(&self, base: &str, quote: &str) -> String {
        self.symbols.resolve_or_concat(base, quote)
    }
}

#[async_trait]
impl Collector for BinanceCollector {
    fn exchange(&self) -> &'static str {
        "binance"
    }

    async fn initialize(&mut self) -> Result<()> {
        let info: ExchangeInfo = self
            .get("/api/v3/exchangeInfo")
            .await
            .map_err(|e| CollectError::initialization("binance", e.to_string()))?;

        let mut symbols = SymbolMap::new("");
        for instrument in info.symbols.iter().filter(|s| s.is_trading()) {
            symbols.insert_pair(
                &instrument.base_asset,
                &instrument.quote_asset,
                instrument.symbol.clone(),
            );
        }

        tracing::info!(pairs = symbols.len(), "binance symbol map initialized");
        self.symbols = symbols;
        Ok(())
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot> {
        let pair = self.resolve(base, quote);
        let ticker: Ticker24h = self
            .get(&format!("/api/v3/ticker/24hr?symbol={pair}"))
            .await
            .map_err(|e| match e {
                // Unknown symbol comes back as a 400; treat it as missing data.
                CollectError::Api {
                    status_code: 400, ..
                } => CollectError::data_unavailable(pair.clone()),
                other => other,
            })?;
        ticker.into_snapshot(Utc::now())
    }

    async fn fetch_order_book(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot> {
        let pair = self.resolve(base, quote);
        let book: Depth = self
            .get(&format!("/api/v3/depth?symbol={pair}&limit={depth}"))
            .await
            .map_err(|e| match e {
                CollectError::Api {
                    status_code: 400, ..
                } => CollectError::data_unavailable(pair.clone()),
                other => other,
            })?;
        book.into_snapshot(Utc::now(), depth)
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
        // REST-only, nothing held open.
        tracing::debug!("binance collector cleanup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ExchangeConfig {
        ExchangeConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
        }
    }

    fn exchange_info_body() -> serde_json::Value {
        serde_json::json!({
            "symbols": [
                {"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT", "status": "TRADING"},
                {"symbol": "ETHUSDT", "baseAsset": "ETH", "quoteAsset": "USDT", "status": "TRADING"},
                {"symbol": "LUNAUSDT", "baseAsset": "LUNA", "quoteAsset": "USDT", "status": "BREAK"}
            ]
        })
    }

    async fn initialized_collector(server: &MockServer) -> BinanceCollector {
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(exchange_info_body()))
            .mount(server)
            .await;

        let mut collector = BinanceCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        collector.initialize().await.unwrap();
        collector
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let config = ExchangeConfig {
            api_key: String::new(),
            api_secret: "secret".to_string(),
            passphrase: None,
        };
        let err = BinanceCollector::new(config).err().unwrap();
        assert!(matches!(err, CollectError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_initialize_builds_symbol_map_from_trading_pairs() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;
        // LUNAUSDT is status BREAK and excluded.
        assert_eq!(collector.mapped_pairs(), 2);
    }

    #[tokio::test]
    async fn test_initialize_failure_is_initialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let mut collector = BinanceCollector::new(test_config())
            .unwrap()
            .with_base_url(server.uri());
        let err = collector.initialize().await.unwrap_err();
        assert!(matches!(err, CollectError::Initialization { .. }));
        assert!(err.to_string().contains("binance"));
    }

    #[tokio::test]
    async fn test_fetch_price_parses_string_payload() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lastPrice": "63250.10",
                "volume": "18200.5",
                "bidPrice": "63249.99",
                "askPrice": "63250.11"
            })))
            .mount(&server)
            .await;

        let snap = collector.fetch_price("BTC", "USDT").await.unwrap();
        assert_eq!(snap.price, 63250.10);
        assert_eq!(snap.bid, 63249.99);
    }

    #[tokio::test]
    async fn test_fetch_price_unknown_symbol_is_data_unavailable() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"code": -1121, "msg": "Invalid symbol."})),
            )
            .mount(&server)
            .await;

        // Unmapped pair falls back to concatenation, then 400s.
        let err = collector.fetch_price("DOGE", "USDT").await.unwrap_err();
        assert!(matches!(err, CollectError::DataUnavailable { .. }));
        assert!(err.to_string().contains("DOGEUSDT"));
    }

    #[tokio::test]
    async fn test_fetch_order_book_preserves_order() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v3/depth"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lastUpdateId": 4711,
                "bids": [["63250.0", "0.5"], ["63249.5", "1.2"]],
                "asks": [["63250.5", "0.3"], ["63251.0", "2.0"]]
            })))
            .mount(&server)
            .await;

        let book = collector.fetch_order_book("BTC", "USDT", 2).await.unwrap();
        assert_eq!(book.last_update_id, 4711);
        assert_eq!(book.best_bid().unwrap().price, 63250.0);
        assert_eq!(book.best_ask().unwrap().price, 63250.5);
    }

    #[tokio::test]
    async fn test_price_series_stamps_grid_timestamps() {
        let server = MockServer::start().await;
        let collector = initialized_collector(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lastPrice": "100.0",
                "volume": "1.0",
                "bidPrice": "99.9",
                "askPrice": "100.1"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let options = TimeSeriesOptions::new(
            Utc::now() - ChronoDuration::minutes(2),
            Utc::now(),
            ChronoDuration::minutes(1),
        );
        let series = collector
            .fetch_price_series("BTC", "USDT", &options)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        for (snapshot, stamp) in series.iter().zip(options.grid()) {
            assert_eq!(snapshot.timestamp, stamp);
        }
    }
}
