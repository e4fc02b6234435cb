//! In-memory [`SnapshotStore`] used by orchestrator and CLI tests.

use arb_collect_core::{
    CollectError, MarketPair, OrderBookSnapshot, PriceSnapshot, Result, SnapshotStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Stores everything in maps keyed by pair id. Optionally fails all writes
/// for one configured pair, to exercise per-pair storage-failure isolation.
#[derive(Default)]
pub struct MemoryStore {
    pairs: Vec<MarketPair>,
    failing_pair: Option<i64>,
    failing_load: bool,
    price_points: Mutex<HashMap<i64, Vec<PriceSnapshot>>>,
    order_books: Mutex<HashMap<i64, Vec<OrderBookSnapshot>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(pairs: Vec<MarketPair>) -> Self {
        Self {
            pairs,
            ..Default::default()
        }
    }

    /// Makes every write for `pair_id` fail with a storage error.
    #[must_use]
    pub fn with_failing_pair(mut self, pair_id: i64) -> Self {
        self.failing_pair = Some(pair_id);
        self
    }

    /// Makes `load_active_pairs` fail with a storage error.
    #[must_use]
    pub fn with_failing_load(mut self) -> Self {
        self.failing_load = true;
        self
    }

    /// Stored price points for one pair.
    #[must_use]
    pub fn price_points(&self, pair_id: i64) -> Vec<PriceSnapshot> {
        self.price_points
            .lock()
            .get(&pair_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored order books for one pair.
    #[must_use]
    pub fn order_books(&self, pair_id: i64) -> Vec<OrderBookSnapshot> {
        self.order_books
            .lock()
            .get(&pair_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, pair_id: i64) -> Result<()> {
        if self.failing_pair == Some(pair_id) {
            return Err(CollectError::Storage(format!(
                "simulated write failure for pair {pair_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load_active_pairs(&self) -> Result<Vec<MarketPair>> {
        if self.failing_load {
            return Err(CollectError::Storage(
                "simulated pair-list load failure".to_string(),
            ));
        }
        Ok(self.pairs.clone())
    }

    async fn insert_price_points(&self, pair_id: i64, points: &[PriceSnapshot]) -> Result<()> {
        self.check(pair_id)?;
        self.price_points
            .lock()
            .entry(pair_id)
            .or_default()
            .extend_from_slice(points);
        Ok(())
    }

    async fn insert_order_books(&self, pair_id: i64, books: &[OrderBookSnapshot]) -> Result<()> {
        self.check(pair_id)?;
        self.order_books
            .lock()
            .entry(pair_id)
            .or_default()
            .extend_from_slice(books);
        Ok(())
    }
}
