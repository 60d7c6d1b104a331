//! Moving Average Convergence Divergence (MACD).
//!
//! Three lines (separate Indicator instances, like the Bollinger bands):
//! - Macd: EMA(close, fast) - EMA(close, slow)
//! - Signal: EMA(macd, signal)
//! - Histogram: macd - signal
//!
//! Lookback: slow - 1 + signal - 1.

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Bar;

/// Which MACD line to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        let tag = match line {
            MacdLine::Macd => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{tag}_{fast}_{slow}_{signal}"),
        }
    }

    /// Compute (macd, signal) lines together, without warmup masking.
    pub fn lines(&self, bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        (macd, signal)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.fast.max(self.slow).saturating_sub(1) + self.signal.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (macd, signal) = self.lines(bars);
        let mut result: Vec<f64> = match self.line {
            MacdLine::Macd => macd,
            MacdLine::Signal => signal,
            MacdLine::Histogram => macd.iter().zip(&signal).map(|(m, s)| m - s).collect(),
        };
        for v in result.iter_mut().take(self.lookback()) {
            *v = f64::NAN;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn constant_prices_give_zero_macd() {
        let bars = make_bars(&[50.0; 40]);
        let r = Macd::new(12, 26, 9, MacdLine::Macd).compute(&bars);
        assert!(r[..33].iter().all(|v| v.is_nan()));
        assert_approx(r[39], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rising_prices_give_positive_macd() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let macd = Macd::new(3, 6, 3, MacdLine::Macd).compute(&bars);
        assert!(macd[59] > 0.0);
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let m = Macd::new(3, 6, 3, MacdLine::Macd).compute(&bars);
        let s = Macd::new(3, 6, 3, MacdLine::Signal).compute(&bars);
        let h = Macd::new(3, 6, 3, MacdLine::Histogram).compute(&bars);
        for i in 7..30 {
            assert_approx(h[i], m[i] - s[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn lookback_combines_slow_and_signal() {
        assert_eq!(Macd::new(12, 26, 9, MacdLine::Signal).lookback(), 33);
    }
}
