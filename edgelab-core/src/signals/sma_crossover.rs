//! Moving-average crossover: long while the short SMA is above the long SMA,
//! short while it is below.

use super::{compare, from_directions, SignalGenerator};
use crate::domain::{BarSeries, SignalSeries};
use crate::indicators::{Indicator, Sma};

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short: Sma,
    long: Sma,
    name: String,
}

impl SmaCrossover {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short: Sma::new(short_window),
            long: Sma::new(long_window),
            name: format!("sma_crossover({short_window},{long_window})"),
        }
    }
}

impl SignalGenerator for SmaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let short = self.short.compute(bars.bars());
        let long = self.long.compute(bars.bars());
        from_directions(bars, |i| compare(short[i] > long[i], short[i] < long[i]))
    }
}
