//! Bybit v5 spot REST collector.
//!
//! Bybit wraps every response in a `{retCode, retMsg, result}` envelope and
//! answers HTTP 200 even on failure; `retCode != 0` is the error signal and
//! is normalized into [`CollectError::Exchange`].

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
use std::sync::Arc;
use std::time::Duration;

/// Default Bybit API base URL.
pub const BYBIT_API_URL: &str = "https://api.bybit.com";

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Response envelope shared by all v5 endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InstrumentList {
    list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    symbol: String,
    base_coin: String,
    quote_coin: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TickerList {
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last_price: String,
    volume24h: String,
    bid1_price: String,
    ask1_price: String,
}

/// Depth payload: `b`/`a` are best-first `[price, size]` string pairs,
/// `u` the book update id.
#[derive(Debug, Deserialize)]
struct Book {
    u: i64,
    b: Vec<[String; 2]>,
    a: Vec<[String; 2]>,
}

/// Bybit v5 spot collector.
pub struct BybitCollector {
    http: Client,
    base_url: String,
    api_key: String,
    symbols: SymbolMap,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl BybitCollector {
    /// Creates a collector, validating that credentials are present.
    ///
    /// # Errors
    /// Returns [`CollectError::Configuration`] when the API key or secret
    /// is empty.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        if !config.is_complete(false) {
            return Err(CollectError::Configuration(
                "bybit: API key and secret are required".to_string(),
            ));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(600u32))));

        Ok(Self {
            http,
            base_url: BYBIT_API_URL.to_string(),
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

    /// Issues one GET and unwraps the v5 envelope.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectError::api(status.as_u16(), body));
        }

        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.ret_code != 0 {
            return Err(CollectError::Exchange(format!(
                "retCode {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }
        envelope
            .result
            .ok_or_else(|| CollectError::Parse("missing result in bybit envelope".to_string()))
    }

    fn resolve(&self, base: &str, quote: &str) -> String {
        self.symbols.resolve_or_concat(base, quote)
    }
}

#[async_trait]
impl Collector for BybitCollector {
    fn exchange(&self) -> &'static str {
        "bybit"
    }

    async fn initialize(&mut self) -> Result<()> {
        let instruments: InstrumentList = self
            .get("/v5/market/instruments-info?category=spot")
            .await
            .map_err(|e| CollectError::initialization("bybit", e.to_string()))?;

        let mut symbols = SymbolMap::new("");
        for instrument in instruments
            .list
            .iter()
            .filter(|i| i.status == "Trading")
        {
            symbols.insert_pair(
                &instrument.base_coin,
                &instrument.quote_coin,
                instrument.symbol.clone(),
            );
        }

        tracing::info!(pairs = symbols.len(), "bybit symbol map initialized");
        self.symbols = symbols;
        Ok(())
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot> {
        let pair = self.resolve(base, quote);
        let tickers: TickerList = self
            .get(&format!("/v5/market/tickers?category=spot&symbol={pair}"))
            .await?;

        // An unknown symbol yields an empty list rather than an error code.
        let ticker = tickers
            .list
            .into_iter()
            .next()
            .ok_or_else(|| CollectError::data_unavailable(pair))?;

        Ok(PriceSnapshot::new(
            parse_f64("lastPrice", &ticker.last_price)?,
            parse_f64("volume24h", &ticker.volume24h)?,
            parse_f64("bid1Price", &ticker.bid1_price)?,
            parse_f64("ask1Price", &ticker.ask1_price)?,
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
        let book: Book = self
            .get(&format!(
                "/v5/market/orderbook?category=spot&symbol={pair}&limit={depth}"
            ))
            .await?;

        let bids = parse_levels(&book.b)?;
        let asks = parse_levels(&book.a)?;
        if bids.is_empty() && asks.is_empty() {
            return Err(CollectError::data_unavailable(pair));
        }

        Ok(OrderBookSnapshot::new(book.u, Utc::now(), bids, asks).truncated(depth))
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
        tracing::debug!("bybit collector cleanup");
    }
}

fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|[price, size]| {
            Ok(BookLevel::new(
                parse_f64("price", price)?,
                parse_f64("size", size)?,
            ))
        })
        .collect()
}
