//! OKX REST collector.
//!
//! OKX is the one integrated exchange that requires a passphrase alongside
//! the API key and secret. Responses use a `{code, msg, data}` envelope
//! with stringly numeric fields; `code != "0"` on an HTTP 200 is the error
//! signal. Instruments are dash-separated (`BTC-USDT`).

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

/// Default OKX API base URL.
pub const OKX_API_URL: &str = "https://www.okx.com";

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last: String,
    vol24h: String,
    bid_px: String,
    ask_px: String,
}

/// Book levels are `[price, size, liquidated orders, order count]`.
#[derive(Debug, Deserialize)]
struct Book {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
    ts: String,
}

/// OKX collector.
pub struct OkxCollector {
    http: Client,
    base_url: String,
    api_key: String,
    passphrase: String,
    symbols: SymbolMap,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl OkxCollector {
    /// Creates a collector, validating key, secret, and passphrase.
    ///
    /// # Errors
    /// Returns [`CollectError::Configuration`] when any credential is
    /// missing; OKX has no partial-credential mode.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        if !config.is_complete(true) {
            return Err(CollectError::Configuration(
                "okx: API key, secret, and passphrase are required".to_string(),
            ));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(nonzero!(300u32))));

        Ok(Self {
            http,
            base_url: OKX_API_URL.to_string(),
            api_key: config.api_key,
            passphrase: config.passphrase.unwrap_or_default(),
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

    /// Issues one GET and unwraps the `{code, msg, data}` envelope.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("OK-ACCESS-KEY", &self.api_key)
            .header("OK-ACCESS-PASSPHRASE", &self.passphrase)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollectError::api(status.as_u16(), body));
        }

        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.code != "0" {
            return Err(CollectError::Exchange(format!(
                "code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        Ok(envelope.data.unwrap_or_default())
    }

    fn resolve(&self, base: &str, quote: &str) -> String {
        self.symbols.resolve_or_concat(base, quote)
    }
}

#[async_trait]
impl Collector for OkxCollector {
    fn exchange(&self) -> &'static str {
        "okx"
    }

    async fn initialize(&mut self) -> Result<()> {
        let instruments: Vec<Instrument> = self
            .get("/api/v5/public/instruments?instType=SPOT")
            .await
            .map_err(|e| CollectError::initialization("okx", e.to_string()))?;

        let mut symbols = SymbolMap::new("-");
        for instrument in instruments.iter().filter(|i| i.state == "live") {
            symbols.insert_pair(
                &instrument.base_ccy,
                &instrument.quote_ccy,
                instrument.inst_id.clone(),
            );
        }

        tracing::info!(pairs = symbols.len(), "okx symbol map initialized");
        self.symbols = symbols;
        Ok(())
    }

    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot> {
        let pair = self.resolve(base, quote);
        let tickers: Vec<Ticker> = self
            .get(&format!("/api/v5/market/ticker?instId={pair}"))
            .await?;

        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| CollectError::data_unavailable(pair))?;

        Ok(PriceSnapshot::new(
            parse_f64("last", &ticker.last)?,
            parse_f64("vol24h", &ticker.vol24h)?,
            parse_f64("bidPx", &ticker.bid_px)?,
            parse_f64("askPx", &ticker.ask_px)?,
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
        let books: Vec<Book> = self
            .get(&format!("/api/v5/market/books?instId={pair}&sz={depth}"))
            .await?;

        let book = books
            .into_iter()
            .next()
            .ok_or_else(|| CollectError::data_unavailable(pair))?;

        let last_update_id = book.ts.parse::<i64>().unwrap_or(0);
        Ok(OrderBookSnapshot::new(
            last_update_id,
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
        tracing::debug!("okx collector cleanup");
    }
}

fn parse_levels(raw: &[Vec<String>]) -> Result<Vec<BookLevel>> {
    raw.iter()
        .map(|level| {
            let price = level
                .first()
                .ok_or_else(|| CollectError::Parse("empty book level".to_string()))?;
            let size = level
                .get(1)
                .ok_or_else(|| CollectError::Parse("book level missing size".to_string()))?;
            Ok(BookLevel::new(
                parse_f64("px", price)?,
                parse_f64("sz", size)?,
            ))
        })
        .collect()
}
