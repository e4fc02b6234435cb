//! Time-series backfill over a fixed sample grid.
//!
//! The exchanges integrated here expose no historical tick data at this
//! depth, so a "time series" is synthesized by repeatedly querying the
//! current ticker/depth endpoint and stamping each sample with the intended
//! grid timestamp rather than the response time. Backfilling a past window
//! therefore returns repeated near-current data relabeled with past
//! timestamps; that approximation is intentional and must not be replaced
//! with invented historical queries.

use crate::error::{CollectError, Result};
use chrono::{DateTime, Duration, Utc};
use std::future::Future;

/// Pacing delay between consecutive calls within one series, to respect
/// exchange rate limits.
pub const SAMPLE_PACING: std::time::Duration = std::time::Duration::from_millis(100);

/// Backfill window and sampling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesOptions {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub interval: Duration,
}

impl TimeSeriesOptions {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            start_time,
            end_time,
            interval,
        }
    }

    /// Window of the trailing `lookback` ending now, sampled at `interval`.
    #[must_use]
    pub fn lookback(lookback: Duration, interval: Duration) -> Self {
        let end_time = Utc::now();
        Self {
            start_time: end_time - lookback,
            end_time,
            interval,
        }
    }

    /// Number of samples the grid produces:
    /// `floor((end - start) / interval) + 1`, inclusive of both endpoints.
    /// Zero for an inverted window or non-positive interval.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        let span = (self.end_time - self.start_time).num_milliseconds();
        let step = self.interval.num_milliseconds();
        if span < 0 || step <= 0 {
            return 0;
        }
        usize::try_from(span / step + 1).unwrap_or(0)
    }

    /// The stamped timestamps: sample `i` is `start + i * interval`.
    #[must_use]
    pub fn grid(&self) -> Vec<DateTime<Utc>> {
        (0..self.sample_count())
            .map(|i| self.start_time + self.interval * i32::try_from(i).unwrap_or(i32::MAX))
            .collect()
    }
}

/// Walks the sample grid, invoking `fetch` once per grid point and pacing
/// consecutive calls by [`SAMPLE_PACING`].
///
/// `fetch` receives the intended timestamp for the sample it produces. Any
/// single failed fetch fails the whole series; isolation happens one level
/// up, per pair.
///
/// # Errors
/// Returns [`CollectError::Configuration`] for an empty grid, or the first
/// error `fetch` yields.
pub async fn backfill<T, F, Fut>(options: &TimeSeriesOptions, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let grid = options.grid();
    if grid.is_empty() {
        return Err(CollectError::Configuration(format!(
            "empty sample grid: start={}, end={}, interval={}s",
            options.start_time,
            options.end_time,
            options.interval.num_seconds()
        )));
    }

    let mut samples = Vec::with_capacity(grid.len());
    for (i, stamp) in grid.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(SAMPLE_PACING).await;
        }
        samples.push(fetch(stamp).await?);
    }
    Ok(samples)
}
