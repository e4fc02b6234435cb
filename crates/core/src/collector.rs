//! The collector contract every exchange integration implements, and the
//! storage seam the orchestrator writes through.

use crate::error::Result;
use crate::series::TimeSeriesOptions;
use crate::snapshot::{MarketPair, OrderBookSnapshot, PriceSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;

/// Uniform contract over one exchange's REST API.
///
/// Construction validates credential presence; [`Collector::initialize`]
/// performs the instrument-list round trip that populates the symbol map.
/// A collector is never asked to fetch a pair whose market does not match
/// its [`Collector::exchange`] name; the orchestrator filters first.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Lower-case exchange name, matched against `MarketPair::market_name`.
    fn exchange(&self) -> &'static str;

    /// Fetches the exchange's tradable-instrument list and builds the
    /// symbol/pair mapping table. Called once per run, before any fetch.
    ///
    /// # Errors
    /// Returns [`crate::CollectError::Initialization`] if the call fails or
    /// the exchange reports an error payload.
    async fn initialize(&mut self) -> Result<()>;

    /// Fetches one current quote for a canonical `base`/`quote` pair.
    ///
    /// # Errors
    /// Returns [`crate::CollectError::DataUnavailable`] when the exchange
    /// has no result for the resolved identifier.
    async fn fetch_price(&self, base: &str, quote: &str) -> Result<PriceSnapshot>;

    /// Fetches current quotes for several base symbols against one quote.
    ///
    /// None of the integrated exchanges expose a usable bulk endpoint, so
    /// the default issues [`Collector::fetch_price`] sequentially. A
    /// failure for one symbol is logged and omitted from the result map;
    /// partial results are expected.
    async fn fetch_prices(&self, bases: &[String], quote: &str) -> HashMap<String, PriceSnapshot> {
        let mut prices = HashMap::new();
        for base in bases {
            match self.fetch_price(base, quote).await {
                Ok(snapshot) => {
                    prices.insert(base.clone(), snapshot);
                }
                Err(e) => {
                    tracing::warn!(
                        exchange = self.exchange(),
                        symbol = %base,
                        quote,
                        error = %e,
                        "price fetch failed, skipping symbol"
                    );
                }
            }
        }
        prices
    }

    /// Fetches one order-book snapshot, both sides truncated to at most
    /// `depth` levels in the exchange's own price-priority order.
    async fn fetch_order_book(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot>;

    /// Synthesizes a price time series over the requested grid by repeated
    /// current-ticker queries. See [`crate::series`] for the approximation
    /// this implies.
    async fn fetch_price_series(
        &self,
        base: &str,
        quote: &str,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<PriceSnapshot>>;

    /// Synthesizes an order-book time series over the requested grid.
    async fn fetch_order_book_series(
        &self,
        base: &str,
        quote: &str,
        depth: usize,
        options: &TimeSeriesOptions,
    ) -> Result<Vec<OrderBookSnapshot>>;

    /// Releases held resources. A no-op for REST-only collectors, but
    /// invoked unconditionally at the end of every run.
    async fn cleanup(&mut self);
}

/// Read/write seam over the hosted database.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads pairs where both the pair and its market are active.
    async fn load_active_pairs(&self) -> Result<Vec<MarketPair>>;

    /// Bulk-inserts price points for one pair.
    async fn insert_price_points(&self, pair_id: i64, points: &[PriceSnapshot]) -> Result<()>;

    /// Inserts order-book headers, then their bid/ask entries referencing
    /// the generated header ids. Deliberately not transactional across the
    /// two phases.
    async fn insert_order_books(&self, pair_id: i64, books: &[OrderBookSnapshot]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectError;
    use crate::series::backfill;
    use chrono::Utc;

    /// Minimal collector whose price fetch fails for a configured base.
    struct FlakyCollector {
        failing_base: &'static str,
    }

    #[async_trait]
    impl Collector for FlakyCollector {
        fn exchange(&self) -> &'static str {
            "flaky"
        }

        async fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        async fn fetch_price(&self, base: &str, _quote: &str) -> Result<PriceSnapshot> {
            if base == self.failing_base {
                return Err(CollectError::data_unavailable(base.to_string()));
            }
            Ok(PriceSnapshot::new(100.0, 10.0, 99.0, 101.0, Utc::now()))
        }

        async fn fetch_order_book(
            &self,
            _base: &str,
            _quote: &str,
            _depth: usize,
        ) -> Result<OrderBookSnapshot> {
            Ok(OrderBookSnapshot::new(0, Utc::now(), vec![], vec![]))
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

        async fn cleanup(&mut self) {}
    }

    #[tokio::test]
    async fn test_fetch_prices_omits_failing_symbol() {
        let collector = FlakyCollector {
            failing_base: "DOGE",
        };
        let bases = vec!["BTC".to_string(), "DOGE".to_string(), "ETH".to_string()];
        let prices = collector.fetch_prices(&bases, "USDT").await;

        // Three requested, one failed: two entries, failing key absent.
        assert_eq!(prices.len(), 2);
        assert!(prices.contains_key("BTC"));
        assert!(prices.contains_key("ETH"));
        assert!(!prices.contains_key("DOGE"));
    }

    #[tokio::test]
    async fn test_fetch_prices_all_failing_is_empty() {
        let collector = FlakyCollector {
            failing_base: "BTC",
        };
        let prices = collector.fetch_prices(&["BTC".to_string()], "USDT").await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_series_through_default_backfill_path() {
        let collector = FlakyCollector {
            failing_base: "DOGE",
        };
        let options = TimeSeriesOptions::new(
            Utc::now() - chrono::Duration::minutes(2),
            Utc::now(),
            chrono::Duration::minutes(1),
        );
        let series = collector
            .fetch_price_series("BTC", "USDT", &options)
            .await
            .unwrap();
        assert_eq!(series.len(), options.sample_count());
        let grid = options.grid();
        for (snapshot, stamp) in series.iter().zip(grid) {
            assert_eq!(snapshot.timestamp, stamp);
        }
    }
}
