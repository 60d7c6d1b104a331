//! Price momentum: long when the N-bar change exceeds `threshold`, short
//! when it falls below `-threshold`.

use super::{compare, from_directions, SignalGenerator};
use crate::domain::{BarSeries, SignalSeries};
use crate::indicators::{Indicator, Roc};

#[derive(Debug, Clone)]
pub struct Momentum {
    roc: Roc,
    threshold: f64,
    name: String,
}

impl Momentum {
    pub fn new(lookback: usize, threshold: f64) -> Self {
        Self {
            roc: Roc::new(lookback),
            threshold,
            name: format!("momentum({lookback},{threshold})"),
        }
    }
}

impl SignalGenerator for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let roc = self.roc.compute(bars.bars());
        from_directions(bars, |i| compare(roc[i] > self.threshold, roc[i] < -self.threshold))
    }
}
