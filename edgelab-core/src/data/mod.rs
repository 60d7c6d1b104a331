//! Bar-series providers and the provider-side cache.
//!
//! Providers fetch validated `BarSeries` for a date range and refuse ranges
//! they cannot fully serve. The engine never talks to a provider; runners
//! fetch everything up front and hand the series over.

pub mod cache;
pub mod csv;
pub mod provider;
pub mod synthetic;

pub use cache::{CacheStats, CachedProvider};
pub use csv::CsvProvider;
pub use provider::{check_coverage, BarSeriesProvider, DataError, StaticProvider, DEFAULT_MAX_GAP_DAYS};
pub use synthetic::SyntheticProvider;

use crate::domain::BarSeries;

/// Deterministic BLAKE3 fingerprint over all bar data.
///
/// Series are hashed in instrument order, so the result does not depend on
/// the order they were fetched in.
pub fn dataset_hash<'a>(series: impl IntoIterator<Item = &'a BarSeries>) -> String {
    let mut sorted: Vec<&BarSeries> = series.into_iter().collect();
    sorted.sort_by(|a, b| a.instrument().cmp(b.instrument()));

    let mut hasher = blake3::Hasher::new();
    for s in sorted {
        hasher.update(s.instrument().as_bytes());
        for bar in s.bars() {
            hasher.update(bar.timestamp.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
