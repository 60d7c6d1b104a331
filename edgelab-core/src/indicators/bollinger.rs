//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses sample stddev (divide by N - 1).
//! Lookback: period - 1.

use super::{mean, sample_std, Indicator};
use crate::domain::Bar;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        let tag = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{tag}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        for i in (self.period - 1)..n {
            let window = &closes[(i + 1 - self.period)..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            let mid = mean(window);
            result[i] = match self.band {
                BollingerBand::Middle => mid,
                BollingerBand::Upper => mid + self.multiplier * sample_std(window),
                BollingerBand::Lower => mid - self.multiplier * sample_std(window),
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn constant_prices_collapse_bands() {
        let bars = make_bars(&[50.0; 10]);
        let upper = Bollinger::upper(5, 2.0).compute(&bars);
        let lower = Bollinger::lower(5, 2.0).compute(&bars);
        assert_approx(upper[9], 50.0, DEFAULT_EPSILON);
        assert_approx(lower[9], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn known_window() {
        // window [1,2,3]: mean 2, sample std 1
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_approx(Bollinger::upper(3, 2.0).compute(&bars)[2], 4.0, DEFAULT_EPSILON);
        assert_approx(Bollinger::middle(3, 2.0).compute(&bars)[2], 2.0, DEFAULT_EPSILON);
        assert_approx(Bollinger::lower(3, 2.0).compute(&bars)[2], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn warmup_is_nan() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let r = Bollinger::middle(3, 2.0).compute(&bars);
        assert!(r[0].is_nan() && r[1].is_nan());
    }
}
