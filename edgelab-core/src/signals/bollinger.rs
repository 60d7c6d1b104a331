//! Bollinger band reversion: long below the lower band, short above the upper.

use super::{compare, from_directions, SignalGenerator};
use crate::domain::{BarSeries, SignalSeries};
use crate::indicators::{Bollinger, Indicator};

#[derive(Debug, Clone)]
pub struct BollingerReversion {
    upper: Bollinger,
    lower: Bollinger,
    name: String,
}

impl BollingerReversion {
    pub fn new(period: usize, num_std: f64) -> Self {
        Self {
            upper: Bollinger::upper(period, num_std),
            lower: Bollinger::lower(period, num_std),
            name: format!("bollinger({period},{num_std})"),
        }
    }
}

impl SignalGenerator for BollingerReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let upper = self.upper.compute(bars.bars());
        let lower = self.lower.compute(bars.bars());
        let closes = bars.closes();
        from_directions(bars, |i| compare(closes[i] < lower[i], closes[i] > upper[i]))
    }
}
