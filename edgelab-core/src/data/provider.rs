//! Provider trait, structured data errors and range coverage checks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::BarSeries;
use crate::error::InputError;

/// Largest calendar gap tolerated between bars, and between the requested
/// range bounds and the first/last bar. Five days covers a long weekend.
pub const DEFAULT_MAX_GAP_DAYS: i64 = 5;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data gap for '{instrument}': no bars between {from} and {to}")]
    DataGap {
        instrument: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("instrument not found: {instrument}")]
    NotFound { instrument: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid bars for '{instrument}': {source}")]
    Input {
        instrument: String,
        #[source]
        source: InputError,
    },
}

/// Source of bar series for a date range.
///
/// Implementations must return only bars inside `[start, end]` and fail with
/// `DataError::DataGap` rather than hand back a partially covered range.
pub trait BarSeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for one instrument over `[start, end]`.
    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError>;
}

impl<P: BarSeriesProvider + ?Sized> BarSeriesProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        (**self).fetch(instrument, start, end)
    }
}

/// Slice `series` to `[start, end]` and verify the slice covers the range.
///
/// Fails with `DataGap` when nothing falls in range, when the first or last
/// bar sits more than `max_gap_days` inside the bounds, or when two
/// consecutive bars are more than `max_gap_days` apart.
pub fn check_coverage(
    series: &BarSeries,
    start: NaiveDate,
    end: NaiveDate,
    max_gap_days: i64,
) -> Result<BarSeries, DataError> {
    if start > end {
        return Err(DataError::InvalidRange { start, end });
    }
    let gap = |from: NaiveDate, to: NaiveDate| DataError::DataGap {
        instrument: series.instrument().to_string(),
        from,
        to,
    };

    let sliced = series.slice_range(start, end).ok_or_else(|| gap(start, end))?;

    let first = sliced.first().timestamp;
    if (first - start).num_days() > max_gap_days {
        return Err(gap(start, first));
    }
    let last = sliced.last().timestamp;
    if (end - last).num_days() > max_gap_days {
        return Err(gap(last, end));
    }
    for w in sliced.bars().windows(2) {
        if (w[1].timestamp - w[0].timestamp).num_days() > max_gap_days {
            return Err(gap(w[0].timestamp, w[1].timestamp));
        }
    }

    Ok(sliced)
}

/// In-memory provider over pre-built series. Used by tests and by callers
/// that already hold their data.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    series: BTreeMap<String, BarSeries>,
    max_gap_days: i64,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
        }
    }

    pub fn with_series(mut self, series: BarSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn with_max_gap_days(mut self, days: i64) -> Self {
        self.max_gap_days = days;
        self
    }

    pub fn insert(&mut self, series: BarSeries) {
        self.series.insert(series.instrument().to_string(), series);
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BarSeriesProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        let series = self.series.get(instrument).ok_or_else(|| DataError::NotFound {
            instrument: instrument.to_string(),
        })?;
        check_coverage(series, start, end, self.max_gap_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Weekday bars for January 2024 (1 Jan is a Monday).
    fn january() -> BarSeries {
        let days = (1..=31)
            .map(|day| d(2024, 1, day))
            .filter(|date| chrono::Datelike::weekday(date).num_days_from_monday() < 5);
        BarSeries::from_closes("SPY", days.map(|ts| (ts, 100.0))).unwrap()
    }

    #[test]
    fn weekends_are_not_gaps() {
        let p = StaticProvider::new().with_series(january());
        let s = p.fetch("SPY", d(2024, 1, 6), d(2024, 1, 21)).unwrap();
        assert_eq!(s.first().timestamp, d(2024, 1, 8));
        assert_eq!(s.last().timestamp, d(2024, 1, 19));
    }

    #[test]
    fn range_past_data_is_a_gap() {
        let p = StaticProvider::new().with_series(january());
        let err = p.fetch("SPY", d(2024, 1, 2), d(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, DataError::DataGap { from, .. } if from == d(2024, 1, 31)));
    }

    #[test]
    fn range_before_data_is_a_gap() {
        let p = StaticProvider::new().with_series(january());
        let err = p.fetch("SPY", d(2023, 12, 1), d(2023, 12, 20)).unwrap_err();
        assert!(matches!(err, DataError::DataGap { .. }));
    }

    #[test]
    fn interior_hole_is_a_gap() {
        let bars = [d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 15), d(2024, 1, 16)];
        let s = BarSeries::from_closes("X", bars.iter().map(|ts| (*ts, 10.0))).unwrap();
        let err = check_coverage(&s, d(2024, 1, 2), d(2024, 1, 16), DEFAULT_MAX_GAP_DAYS).unwrap_err();
        match err {
            DataError::DataGap { from, to, .. } => {
                assert_eq!(from, d(2024, 1, 3));
                assert_eq!(to, d(2024, 1, 15));
            }
            other => panic!("expected DataGap, got {other:?}"),
        }
    }

    #[test]
    fn unknown_instrument() {
        let p = StaticProvider::new();
        assert!(matches!(
            p.fetch("NOPE", d(2024, 1, 1), d(2024, 1, 5)),
            Err(DataError::NotFound { .. })
        ));
    }

    #[test]
    fn inverted_range() {
        let p = StaticProvider::new().with_series(january());
        assert!(matches!(
            p.fetch("SPY", d(2024, 1, 10), d(2024, 1, 5)),
            Err(DataError::InvalidRange { .. })
        ));
    }
}
