use arb_collect_core::CollectError;
use std::collections::BTreeMap;
use std::fmt;

/// One exchange whose initialization failed. The run continues without it;
/// its pairs are counted as skipped.
#[derive(Debug)]
pub struct InitFailure {
    pub exchange: &'static str,
    pub error: CollectError,
}

/// Outcome counters for one collection run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Pairs with both series stored.
    pub pairs_succeeded: usize,
    /// Pairs where a fetch or store call failed.
    pub pairs_failed: usize,
    /// Active pairs with no initialized collector for their market.
    pub pairs_skipped: usize,
    /// Pairs processed per exchange, succeeded or failed.
    pub pairs_by_exchange: BTreeMap<&'static str, usize>,
    pub init_failures: Vec<InitFailure>,
}

impl RunSummary {
    /// True when at least one pair was stored and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pairs_failed == 0 && self.init_failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pairs succeeded, {} failed, {} skipped",
            self.pairs_succeeded, self.pairs_failed, self.pairs_skipped
        )?;
        for (exchange, count) in &self.pairs_by_exchange {
            write!(f, "; {exchange}: {count}")?;
        }
        for failure in &self.init_failures {
            write!(f, "; {} failed to initialize: {}", failure.exchange, failure.error)?;
        }
        Ok(())
    }
}
