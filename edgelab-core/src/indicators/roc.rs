//! Rate of Change (ROC) over N bars.
//!
//! ROC[t] = close[t] / close[t - period] - 1, a fraction (0.05 = +5%).
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let base = bars[i - self.period].close;
            if base > 0.0 && base.is_finite() {
                result[i] = bars[i].close / base - 1.0;
            }
        }
        result
    }
}
