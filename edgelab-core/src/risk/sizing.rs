//! Position sizers: turn bar history and a direction into a fraction of equity.
//!
//! Sizers only see `history` (bars up to and including the current one) and
//! always return a fraction in `[0, cap]`. The Risk Manager converts that
//! fraction into whole units.

use crate::domain::{Bar, Direction};

/// Sizing logic shared by the Kelly and volatility-scaled variants.
pub trait PositionSizer: Send + Sync {
    /// Sizer name for reports and logging.
    fn name(&self) -> &str;

    /// Fraction of equity to commit to a `direction` position, clamped to `[0, cap]`.
    fn fraction(&self, history: &[Bar], direction: Direction, cap: f64) -> f64;
}

fn trailing_returns(history: &[Bar], count: usize) -> Option<Vec<f64>> {
    if history.len() < count + 1 {
        return None;
    }
    let tail = &history[history.len() - count - 1..];
    Some(tail.windows(2).map(|w| w[1].return_from(&w[0])).collect())
}

/// Kelly-fraction sizing.
///
/// # Formula
/// ```text
/// r_i = sign(direction) * trailing bar returns
/// p   = share of r_i > 0
/// b   = mean(gains) / mean(|losses|)
/// f   = p - (1 - p) / b, clamped to [0, cap]
/// ```
/// No losses but some gains gives `cap`; no gains gives 0. With less than
/// `lookback` returns of history the sizer commits half the cap.
#[derive(Debug, Clone)]
pub struct KellySizer {
    lookback: usize,
}

impl KellySizer {
    pub fn new(lookback: usize) -> Self {
        assert!(lookback >= 2, "kelly lookback must be >= 2");
        Self { lookback }
    }
}

impl PositionSizer for KellySizer {
    fn name(&self) -> &str {
        "kelly"
    }

    fn fraction(&self, history: &[Bar], direction: Direction, cap: f64) -> f64 {
        let sign = direction.sign();
        if sign == 0.0 || cap <= 0.0 {
            return 0.0;
        }
        let Some(returns) = trailing_returns(history, self.lookback) else {
            return cap * 0.5;
        };

        let signed = returns.iter().map(|r| r * sign);
        let (mut gains, mut losses, mut wins, mut n_losses) = (0.0, 0.0, 0usize, 0usize);
        for r in signed {
            if r > 0.0 {
                gains += r;
                wins += 1;
            } else if r < 0.0 {
                losses -= r;
                n_losses += 1;
            }
        }

        if wins == 0 {
            return 0.0;
        }
        if n_losses == 0 {
            return cap;
        }

        let p = wins as f64 / returns.len() as f64;
        let b = (gains / wins as f64) / (losses / n_losses as f64);
        (p - (1.0 - p) / b).clamp(0.0, cap)
    }
}

/// Volatility-scaled sizing.
///
/// # Formula
/// ```text
/// sigma_t   = sample stdev of the trailing `lookback` returns
/// sigma_ref = mean of every sigma available up to t (expanding)
/// f         = cap * min(1, sigma_ref / sigma_t)
/// ```
/// Until the first full window exists the sizer commits the full cap.
#[derive(Debug, Clone)]
pub struct VolatilitySizer {
    lookback: usize,
}

impl VolatilitySizer {
    pub fn new(lookback: usize) -> Self {
        assert!(lookback >= 2, "volatility lookback must be >= 2");
        Self { lookback }
    }

    /// (current sigma, expanding mean of sigma). Rolling sums keep this linear.
    fn sigmas(&self, history: &[Bar]) -> Option<(f64, f64)> {
        if history.len() < self.lookback + 1 {
            return None;
        }
        let returns: Vec<f64> = history.windows(2).map(|w| w[1].return_from(&w[0])).collect();
        let n = self.lookback as f64;
        let (mut sum, mut sum_sq) = (0.0, 0.0);
        let (mut sigma_total, mut sigma_count, mut current) = (0.0, 0usize, 0.0);

        for (i, r) in returns.iter().enumerate() {
            sum += r;
            sum_sq += r * r;
            if i >= self.lookback {
                let out = returns[i - self.lookback];
                sum -= out;
                sum_sq -= out * out;
            }
            if i + 1 >= self.lookback {
                let var = ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0);
                current = var.sqrt();
                sigma_total += current;
                sigma_count += 1;
            }
        }

        Some((current, sigma_total / sigma_count as f64))
    }
}

impl PositionSizer for VolatilitySizer {
    fn name(&self) -> &str {
        "vol_scaled"
    }

    fn fraction(&self, history: &[Bar], direction: Direction, cap: f64) -> f64 {
        if direction == Direction::Flat || cap <= 0.0 {
            return 0.0;
        }
        match self.sigmas(history) {
            Some((current, reference)) if current > 1e-12 => cap * (reference / current).min(1.0),
            _ => cap,
        }
    }
}
