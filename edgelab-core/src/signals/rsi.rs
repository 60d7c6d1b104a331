//! RSI mean reversion: long when oversold, short when overbought.

use super::{compare, from_directions, SignalGenerator};
use crate::domain::{BarSeries, SignalSeries};
use crate::indicators::{Indicator, Rsi};

#[derive(Debug, Clone)]
pub struct RsiReversion {
    rsi: Rsi,
    oversold: f64,
    overbought: f64,
    name: String,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            rsi: Rsi::new(period),
            oversold,
            overbought,
            name: format!("rsi({period},{oversold},{overbought})"),
        }
    }
}

impl SignalGenerator for RsiReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let rsi = self.rsi.compute(bars.bars());
        from_directions(bars, |i| compare(rsi[i] < self.oversold, rsi[i] > self.overbought))
    }
}
