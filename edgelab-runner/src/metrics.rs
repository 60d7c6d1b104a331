//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trade list in, scalar
//! out. Degenerate inputs (no trades, zero variance, no benchmark) produce
//! explicit sentinels, never NaN and never an error.

use serde::{Deserialize, Serialize};

use edgelab_core::domain::{EquityPoint, Trade};

/// Trading days per year for annualization.
pub const TRADING_DAYS: f64 = 252.0;

const VARIANCE_FLOOR: f64 = 1e-15;

/// Gross profit over gross loss. No losing trades with some profit is `Infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfitFactor {
    Finite(f64),
    Infinite,
}

impl ProfitFactor {
    pub fn is_infinite(&self) -> bool {
        matches!(self, ProfitFactor::Infinite)
    }

    /// Numeric value for sorting and display; `Infinite` maps to `f64::INFINITY`.
    pub fn value(&self) -> f64 {
        match self {
            ProfitFactor::Finite(v) => *v,
            ProfitFactor::Infinite => f64::INFINITY,
        }
    }
}

impl std::fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{v:.2}"),
            ProfitFactor::Infinite => write!(f, "inf"),
        }
    }
}

/// Trade-derived statistics. `NoTrades` is the sentinel for an empty trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStats {
    NoTrades,
    Computed {
        trade_count: usize,
        win_rate: f64,
        profit_factor: ProfitFactor,
        avg_win: f64,
        avg_loss: f64,
        largest_win: f64,
        largest_loss: f64,
        avg_bars_held: f64,
    },
}

impl TradeStats {
    pub fn trade_count(&self) -> usize {
        match self {
            TradeStats::NoTrades => 0,
            TradeStats::Computed { trade_count, .. } => *trade_count,
        }
    }

    /// Win rate, or `None` with no trades.
    pub fn win_rate(&self) -> Option<f64> {
        match self {
            TradeStats::NoTrades => None,
            TradeStats::Computed { win_rate, .. } => Some(*win_rate),
        }
    }

    pub fn profit_factor(&self) -> Option<ProfitFactor> {
        match self {
            TradeStats::NoTrades => None,
            TradeStats::Computed { profit_factor, .. } => Some(*profit_factor),
        }
    }
}

/// Comparison against a benchmark curve. `Unavailable` when there is no
/// benchmark, too little overlap, or a flat benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketComparison {
    Unavailable,
    Computed {
        alpha: f64,
        beta: f64,
        information_ratio: f64,
        benchmark_return: f64,
    },
}

/// Full analysis of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub bars: usize,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Positive fraction, e.g. 0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub avg_drawdown: f64,
    /// Longest run of consecutive bars below the prior peak.
    pub max_drawdown_duration: usize,
    pub var_95: f64,
    pub cvar_95: f64,
    pub trades: TradeStats,
    pub market: MarketComparison,
    /// Commissions paid over the run.
    #[serde(default)]
    pub total_fees: f64,
}

/// Analyze an equity curve and trade log, optionally against a benchmark curve.
pub fn analyze(equity_curve: &[EquityPoint], trades: &[Trade], benchmark: Option<&[EquityPoint]>) -> Metrics {
    let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let returns = daily_returns(&equity);
    let total = total_return(&equity);
    let annualized = annualized_return(total, equity.len());
    let max_dd = max_drawdown(&equity);

    let market = match benchmark {
        Some(bench) => {
            let bench_equity: Vec<f64> = bench.iter().map(|p| p.equity).collect();
            market_comparison(&returns, &daily_returns(&bench_equity), total_return(&bench_equity))
        }
        None => MarketComparison::Unavailable,
    };

    Metrics {
        bars: equity.len(),
        initial_equity: equity.first().copied().unwrap_or(0.0),
        final_equity: equity.last().copied().unwrap_or(0.0),
        total_return: total,
        annualized_return: annualized,
        volatility: sample_std(&returns) * TRADING_DAYS.sqrt(),
        sharpe: sharpe_ratio(&returns),
        sortino: sortino_ratio(&returns),
        calmar: if max_dd > 0.0 { annualized / max_dd } else { 0.0 },
        max_drawdown: max_dd,
        avg_drawdown: avg_drawdown(&equity),
        max_drawdown_duration: max_drawdown_duration(&equity),
        var_95: value_at_risk(&returns, 0.95),
        cvar_95: conditional_var(&returns, 0.95),
        trades: trade_stats(trades),
        market,
        total_fees: trades.iter().map(|t| t.fees).sum(),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Bar-over-bar simple returns. Bars after a non-positive equity are skipped.
pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// final / initial - 1. Zero for fewer than two points.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if equity.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// (1 + total)^(252 / bars) - 1.
pub fn annualized_return(total_return: f64, bars: usize) -> f64 {
    if bars == 0 || total_return <= -1.0 {
        return if total_return <= -1.0 { -1.0 } else { 0.0 };
    }
    (1.0 + total_return).powf(TRADING_DAYS / bars as f64) - 1.0
}

/// mean / std * sqrt(252). Zero when there is no variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = sample_std(returns);
    if std < VARIANCE_FLOOR {
        return 0.0;
    }
    mean(returns) / std * TRADING_DAYS.sqrt()
}

/// mean / std(negative returns only) * sqrt(252). Zero with fewer than two
/// losing bars or no downside spread.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let std = sample_std(&downside);
    if std < VARIANCE_FLOOR {
        return 0.0;
    }
    mean(returns) / std * TRADING_DAYS.sqrt()
}

/// Per-bar drawdown from the running peak, as positive fractions.
pub fn drawdowns(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&eq| {
            peak = peak.max(eq);
            if peak > 0.0 {
                ((peak - eq) / peak).max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// max over t of (peak(t) - equity(t)) / peak(t).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdowns(equity).into_iter().fold(0.0, f64::max)
}

/// Mean drawdown over the bars spent below a prior peak.
pub fn avg_drawdown(equity: &[f64]) -> f64 {
    let under: Vec<f64> = drawdowns(equity).into_iter().filter(|d| *d > 0.0).collect();
    mean(&under)
}

pub fn max_drawdown_duration(equity: &[f64]) -> usize {
    let (mut longest, mut current) = (0usize, 0usize);
    for dd in drawdowns(equity) {
        if dd > 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Historical VaR: the (1 - confidence) quantile of returns, linearly interpolated.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    percentile(returns, 1.0 - confidence)
}

/// Mean of the returns at or below the VaR quantile.
pub fn conditional_var(returns: &[f64], confidence: f64) -> f64 {
    let var = value_at_risk(returns, confidence);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    mean(&tail)
}

pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats::NoTrades;
    }
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();

    let profit_factor = if gross_loss > 0.0 {
        ProfitFactor::Finite(gross_profit / gross_loss)
    } else if gross_profit > 0.0 {
        ProfitFactor::Infinite
    } else {
        ProfitFactor::Finite(0.0)
    };

    TradeStats::Computed {
        trade_count: trades.len(),
        win_rate: wins.len() as f64 / trades.len() as f64,
        profit_factor,
        avg_win: mean(&wins),
        avg_loss: mean(&losses),
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        avg_bars_held: trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / trades.len() as f64,
    }
}

/// Beta, alpha and information ratio over the common tail of both return series.
pub fn market_comparison(strategy: &[f64], benchmark: &[f64], benchmark_return: f64) -> MarketComparison {
    let n = strategy.len().min(benchmark.len());
    if n < 2 {
        return MarketComparison::Unavailable;
    }
    let s = &strategy[strategy.len() - n..];
    let b = &benchmark[benchmark.len() - n..];

    let var_b = sample_variance(b);
    if var_b < VARIANCE_FLOOR {
        return MarketComparison::Unavailable;
    }
    let beta = covariance(s, b) / var_b;
    let alpha = mean(s) - beta * mean(b);

    let excess: Vec<f64> = s.iter().zip(b).map(|(x, y)| x - y).collect();
    let tracking = sample_std(&excess);
    let information_ratio = if tracking < VARIANCE_FLOOR {
        0.0
    } else {
        mean(&excess) / tracking * TRADING_DAYS.sqrt()
    };

    MarketComparison::Computed {
        alpha,
        beta,
        information_ratio,
        benchmark_return,
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

fn covariance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(a), mean(b));
    a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (a.len() - 1) as f64
}

fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
