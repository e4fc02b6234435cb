//! Drives registered collectors through one collection run.
//!
//! A run walks Idle -> Initializing -> Ready -> Collecting -> Done, or
//! Failed when nothing can proceed. Exchange initialization failures and
//! per-pair fetch/store failures are isolated; only a fatal condition
//! (no collectors, or no eligible pairs) aborts the run.

use crate::summary::{InitFailure, RunSummary};
use arb_collect_core::{
    CollectError, Collector, MarketPair, Result, SnapshotStore, TimeSeriesOptions,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Initializing,
    Ready,
    Collecting,
    Done,
    Failed,
}

pub struct CollectionOrchestrator {
    collectors: Vec<Box<dyn Collector>>,
    store: Arc<dyn SnapshotStore>,
    state: RunState,
    pairs: Vec<MarketPair>,
}

impl CollectionOrchestrator {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            collectors: Vec::new(),
            store,
            state: RunState::Idle,
            pairs: Vec::new(),
        }
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        info!(exchange = collector.exchange(), "registered collector");
        self.collectors.push(collector);
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Loads active pairs and initializes every registered collector.
    ///
    /// A collector whose `initialize` fails is dropped from the run and
    /// reported in the returned list; its pairs are later counted as
    /// skipped rather than failed.
    ///
    /// # Errors
    /// Returns [`CollectError::Fatal`] when no collector is registered,
    /// the active-pair list cannot be loaded, every collector failed to
    /// initialize, or no active pair matches a surviving collector.
    pub async fn initialize(&mut self) -> Result<Vec<InitFailure>> {
        self.state = RunState::Initializing;

        if self.collectors.is_empty() {
            self.state = RunState::Failed;
            return Err(CollectError::Fatal(
                "no collectors registered; check exchange credentials".to_string(),
            ));
        }

        self.pairs = match self.store.load_active_pairs().await {
            Ok(pairs) => pairs,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(CollectError::Fatal(format!(
                    "could not load active pairs: {e}"
                )));
            }
        };
        info!(pairs = self.pairs.len(), "loaded active pairs");

        let mut failures = Vec::new();
        let mut survivors = Vec::new();
        for mut collector in std::mem::take(&mut self.collectors) {
            let exchange = collector.exchange();
            match collector.initialize().await {
                Ok(()) => {
                    info!(exchange, "collector initialized");
                    survivors.push(collector);
                }
                Err(e) => {
                    warn!(exchange, error = %e, "collector failed to initialize, excluding from run");
                    failures.push(InitFailure { exchange, error: e });
                }
            }
        }
        self.collectors = survivors;

        if self.collectors.is_empty() {
            self.state = RunState::Failed;
            return Err(CollectError::Fatal(
                "every collector failed to initialize".to_string(),
            ));
        }
        if !self.pairs.iter().any(|p| self.collector_for(p).is_some()) {
            self.state = RunState::Failed;
            return Err(CollectError::Fatal(
                "no active pair matches an initialized collector".to_string(),
            ));
        }

        self.state = RunState::Ready;
        Ok(failures)
    }

    /// Collects both time series for every eligible pair and stores them.
    ///
    /// Pairs are processed sequentially per exchange. The two series for
    /// one pair are fetched concurrently; any fetch or store error marks
    /// that pair failed and the run moves on.
    pub async fn collect(&mut self, options: &TimeSeriesOptions, depth: usize) -> RunSummary {
        self.state = RunState::Collecting;
        let mut summary = RunSummary {
            pairs_skipped: self
                .pairs
                .iter()
                .filter(|p| self.collector_for(p).is_none())
                .count(),
            ..RunSummary::default()
        };

        for collector in &self.collectors {
            let exchange = collector.exchange();
            let pairs = self
                .pairs
                .iter()
                .filter(|p| p.market_name.to_lowercase() == exchange);
            for pair in pairs {
                let base = pair.base_currency.as_str();
                let quote = pair.quote_currency.as_str();

                let (prices, books) = tokio::join!(
                    collector.fetch_price_series(base, quote, options),
                    collector.fetch_order_book_series(base, quote, depth, options),
                );

                let stored = async {
                    let prices = prices?;
                    let books = books?;
                    self.store.insert_price_points(pair.id, &prices).await?;
                    self.store.insert_order_books(pair.id, &books).await?;
                    Ok::<_, CollectError>((prices.len(), books.len()))
                }
                .await;

                *summary.pairs_by_exchange.entry(exchange).or_insert(0) += 1;
                match stored {
                    Ok((price_count, book_count)) => {
                        info!(
                            exchange,
                            pair = %pair.canonical(),
                            price_count,
                            book_count,
                            "stored pair series"
                        );
                        summary.pairs_succeeded += 1;
                    }
                    Err(e) => {
                        error!(exchange, pair = %pair.canonical(), error = %e, "pair collection failed");
                        summary.pairs_failed += 1;
                    }
                }
            }
        }

        self.state = RunState::Done;
        summary
    }

    /// Calls `cleanup` on every surviving collector. Runs unconditionally,
    /// including after a failed run.
    pub async fn cleanup(&mut self) {
        for collector in &mut self.collectors {
            collector.cleanup().await;
        }
    }

    /// One full run: initialize, collect, cleanup.
    ///
    /// # Errors
    /// Only [`CollectError::Fatal`] (or a storage failure loading pairs)
    /// surfaces as an error; everything else lands in the summary.
    pub async fn run(&mut self, options: &TimeSeriesOptions, depth: usize) -> Result<RunSummary> {
        let init_result = self.initialize().await;
        let failures = match init_result {
            Ok(failures) => failures,
            Err(e) => {
                self.cleanup().await;
                return Err(e);
            }
        };

        let mut summary = self.collect(options, depth).await;
        summary.init_failures = failures;
        self.cleanup().await;

        info!(%summary, "collection run finished");
        Ok(summary)
    }

    fn collector_for(&self, pair: &MarketPair) -> Option<&dyn Collector> {
        let market = pair.market_name.to_lowercase();
        self.collectors
            .iter()
            .find(|c| c.exchange() == market)
            .map(AsRef::as_ref)
    }
}
