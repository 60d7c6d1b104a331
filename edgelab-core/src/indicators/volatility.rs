//! Rolling volatility of close-to-close returns.
//!
//! Used by the volatility-scaled sizer and the correlation grouping.
//! Lookback: period (period returns need period + 1 closes).

use super::{sample_std, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct ReturnVolatility {
    period: usize,
    name: String,
}

impl ReturnVolatility {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "volatility period must be >= 2");
        Self {
            period,
            name: format!("vol_{period}"),
        }
    }
}

impl Indicator for ReturnVolatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut returns = vec![f64::NAN; bars.len()];
        for i in 1..bars.len() {
            returns[i] = bars[i].return_from(&bars[i - 1]);
        }
        rolling_std(&returns, self.period)
    }
}

/// Trailing sample standard deviation. NaN inside a window yields NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window < 2 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let w = &values[(i + 1 - window)..=i];
        if w.iter().all(|v| v.is_finite()) {
            result[i] = sample_std(w);
        }
    }
    result
}
