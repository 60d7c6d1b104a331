//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[0] = close[0]. Values before index period-1 are reported as NaN (warmup)
//! even though the recursion runs from the first bar.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut result = ema_of_series(&closes, self.period);
        for v in result.iter_mut().take(self.lookback()) {
            *v = f64::NAN;
        }
        result
    }
}

/// Raw EMA of an arbitrary series, seeded with the first finite value.
///
/// Leading NaNs stay NaN; the recursion starts at the first finite value.
/// Used by MACD for both the fast/slow lines and the signal line.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let alpha = 2.0 / (period as f64 + 1.0);

    let mut prev: Option<f64> = None;
    for i in 0..n {
        let v = values[i];
        if v.is_nan() {
            if prev.is_some() {
                // NaN after seeding taints everything that follows.
                return result;
            }
            continue;
        }
        let ema = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        result[i] = ema;
        prev = Some(ema);
    }

    result
}
