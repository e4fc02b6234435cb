//! CSV export of collected price points, plus query-parameter validation.

use arb_collect_core::{CollectError, PriceSnapshot, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::path::Path;

/// Longest range a single export query may span.
const MAX_QUERY_DAYS: i64 = 92;

/// Rejects inverted ranges and ranges longer than three months.
pub fn validate_query_params(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
    if from > to {
        return Err(CollectError::Configuration(format!(
            "invalid range: from {from} is after to {to}"
        )));
    }
    let span = to - from;
    if span.num_days() > MAX_QUERY_DAYS {
        return Err(CollectError::Configuration(format!(
            "range spans {} days, maximum is {MAX_QUERY_DAYS}",
            span.num_days()
        )));
    }
    Ok(())
}

/// Builds `prices_{pair_id}_{from}_{to}.csv` using only the date portion of
/// each bound, whatever timezone offset the caller parsed them with.
#[must_use]
pub fn generate_csv_filename(
    pair_id: i64,
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
) -> String {
    format!(
        "prices_{pair_id}_{}_{}.csv",
        from.date_naive().format("%Y-%m-%d"),
        to.date_naive().format("%Y-%m-%d"),
    )
}

#[derive(Debug, Serialize)]
struct PriceRecord {
    timestamp: String,
    price: f64,
    volume_24h: f64,
    bid: f64,
    ask: f64,
}

/// Writes price points to `path` with a header row, RFC 3339 timestamps.
pub fn write_price_csv(path: &Path, points: &[PriceSnapshot]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| CollectError::Storage(format!("failed to create {}: {e}", path.display())))?;

    for point in points {
        let record = PriceRecord {
            timestamp: point.timestamp.to_rfc3339(),
            price: point.price,
            volume_24h: point.volume_24h,
            bid: point.bid,
            ask: point.ask,
        };
        writer
            .serialize(record)
            .map_err(|e| CollectError::Storage(format!("failed to write record: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| CollectError::Storage(format!("failed to flush csv: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_accepts_ordinary_range() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(validate_query_params(from, to).is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let from = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = validate_query_params(from, to).unwrap_err();
        assert!(matches!(err, CollectError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_over_three_months() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let err = validate_query_params(from, to).unwrap_err();
        assert!(matches!(err, CollectError::Configuration(_)));
    }

    #[test]
    fn test_filename_uses_date_portion_only() {
        let from: DateTime<FixedOffset> = "2024-03-01T00:00:00+02:00".parse().unwrap();
        let to: DateTime<FixedOffset> = "2024-03-15T23:59:59-05:00".parse().unwrap();
        assert_eq!(
            generate_csv_filename(42, from, to),
            "prices_42_2024-03-01_2024-03-15.csv"
        );
    }

    #[test]
    fn test_filename_same_dates_different_offsets_match() {
        let a: DateTime<FixedOffset> = "2024-06-10T12:00:00+09:00".parse().unwrap();
        let b: DateTime<FixedOffset> = "2024-06-10T12:00:00-08:00".parse().unwrap();
        assert_eq!(
            generate_csv_filename(1, a, a),
            generate_csv_filename(1, b, b)
        );
    }

    #[test]
    fn test_write_price_csv_emits_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let points = vec![
            PriceSnapshot::new(100.0, 5000.0, 99.5, 100.5, at),
            PriceSnapshot::new(101.0, 5100.0, 100.5, 101.5, at),
        ];

        write_price_csv(&path, &points).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,price,volume_24h,bid,ask"
        );
        assert_eq!(lines.count(), 2);
        assert!(contents.contains("100.0") || contents.contains("100,"));
    }
}
