//! MACD crossover: long while the MACD line is above its signal line.

use super::{compare, from_directions, SignalGenerator};
use crate::domain::{BarSeries, SignalSeries};
use crate::indicators::{Indicator, Macd, MacdLine};

#[derive(Debug, Clone)]
pub struct MacdCrossover {
    line: Macd,
    signal: Macd,
    name: String,
}

impl MacdCrossover {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            line: Macd::new(fast, slow, signal, MacdLine::Macd),
            signal: Macd::new(fast, slow, signal, MacdLine::Signal),
            name: format!("macd({fast},{slow},{signal})"),
        }
    }
}

impl SignalGenerator for MacdCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let line = self.line.compute(bars.bars());
        let signal = self.signal.compute(bars.bars());
        from_directions(bars, |i| compare(line[i] > signal[i], line[i] < signal[i]))
    }
}
