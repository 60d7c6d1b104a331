//! Signal generators: bar series in, one directional signal per bar out.
//!
//! Every generator is causal. The signal at bar t is computed from bars
//! `0..=t` only, so truncating the input never changes earlier signals.
//! Bars still inside an indicator's warmup produce FLAT.

pub mod bollinger;
pub mod composite;
pub mod config;
pub mod macd;
pub mod momentum;
pub mod rsi;
pub mod sma_crossover;

pub use bollinger::BollingerReversion;
pub use composite::{Aggregation, Composite};
pub use config::StrategyConfig;
pub use macd::MacdCrossover;
pub use momentum::Momentum;
pub use rsi::RsiReversion;
pub use sma_crossover::SmaCrossover;

use crate::domain::{BarSeries, Direction, Signal, SignalSeries};

/// A strategy's signal function.
pub trait SignalGenerator: Send + Sync {
    /// Short label including parameters, e.g. "sma_crossover(50,200)".
    fn name(&self) -> &str;

    /// One signal per bar of `bars`, sharing its timestamps.
    fn generate(&self, bars: &BarSeries) -> SignalSeries;
}

/// Build a discrete ±1/0 signal series from a per-bar direction rule.
pub(crate) fn from_directions(bars: &BarSeries, mut rule: impl FnMut(usize) -> Direction) -> SignalSeries {
    bars.bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| match rule(i) {
            Direction::Long => Signal::long(bar.timestamp),
            Direction::Short => Signal::short(bar.timestamp),
            Direction::Flat => Signal::flat(bar.timestamp),
        })
        .collect()
}

/// Direction from a pair of comparisons. NaN on either side compares false,
/// so warmup bars come out FLAT.
pub(crate) fn compare(long_when: bool, short_when: bool) -> Direction {
    if long_when {
        Direction::Long
    } else if short_when {
        Direction::Short
    } else {
        Direction::Flat
    }
}

#[cfg(test)]
pub(crate) fn series_from_closes(closes: &[f64]) -> BarSeries {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    BarSeries::from_closes(
        "TEST",
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| (base + chrono::Duration::days(i as i64), *c)),
    )
    .unwrap()
}

#[cfg(test)]
pub(crate) fn directions(series: &SignalSeries) -> Vec<Direction> {
    series.signals().iter().map(|s| s.direction).collect()
}
