//! Deterministic synthetic bars for demos and tests.
//!
//! A random walk from 100.0 over weekdays only. The RNG is seeded from the
//! BLAKE3 hash of the instrument name (mixed with an optional seed), so the
//! same request always yields the same bars.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{BarSeriesProvider, DataError};
use crate::domain::{Bar, BarSeries};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    start_price: f64,
    daily_range: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            seed: 0,
            start_price: 100.0,
            daily_range: 0.03,
        }
    }
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Maximum absolute daily return of the walk.
    pub fn with_daily_range(mut self, range: f64) -> Self {
        self.daily_range = range.abs();
        self
    }

    fn rng_for(&self, instrument: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(instrument.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    pub fn generate(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
        let mut rng = self.rng_for(instrument);
        let mut bars = Vec::new();
        let mut price = self.start_price;
        let mut current = start;

        while current <= end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = if self.daily_range > 0.0 {
                rng.gen_range(-self.daily_range..self.daily_range)
            } else {
                0.0
            };
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);

            bars.push(Bar::new(current, open, high, low, close, volume));
            price = close;
            current += chrono::Duration::days(1);
        }

        bars
    }
}

impl BarSeriesProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let bars = self.generate(instrument, start, end);
        if bars.is_empty() {
            return Err(DataError::DataGap {
                instrument: instrument.to_string(),
                from: start,
                to: end,
            });
        }
        BarSeries::new(instrument, bars).map_err(|source| DataError::Input {
            instrument: instrument.to_string(),
            source,
        })
    }
}
