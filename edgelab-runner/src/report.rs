//! Human-readable text reports.
//!
//! Sections: returns, risk-adjusted, drawdown, trade statistics, market
//! comparison, risk. Sentinels print as `n/a` instead of numbers.

use std::fmt::Write as _;

use crate::batch::ComparisonRow;
use crate::metrics::{MarketComparison, TradeStats};
use crate::runner::RunReport;

const RULE: &str = "============================================================";

/// Plain-text summary of one run.
pub fn summary(report: &RunReport) -> String {
    let m = &report.metrics;
    let mut out = String::with_capacity(2048);

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "BACKTEST SUMMARY: {}", report.name);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Strategy:         {}", report.strategy_label);
    let _ = writeln!(out, "Instruments:      {}", report.instruments.join(", "));
    let _ = writeln!(out, "Period:           {} to {} ({} bars)", report.start, report.end, report.bar_count);
    let _ = writeln!(out, "Initial capital:  {:.2}", report.initial_capital);
    let _ = writeln!(out, "Dataset hash:     {}", report.dataset_hash);
    if report.halted {
        let _ = writeln!(out, "Trading halted:   drawdown limit breached");
    }

    section(&mut out, "RETURNS");
    row(&mut out, "Total return", pct(m.total_return));
    row(&mut out, "Annualized return", pct(m.annualized_return));
    row(&mut out, "Final equity", format!("{:.2}", m.final_equity));
    row(&mut out, "Commissions", format!("{:.2}", m.total_fees));

    section(&mut out, "RISK-ADJUSTED");
    row(&mut out, "Volatility (ann.)", pct(m.volatility));
    row(&mut out, "Sharpe ratio", format!("{:.3}", m.sharpe));
    row(&mut out, "Sortino ratio", format!("{:.3}", m.sortino));
    row(&mut out, "Calmar ratio", format!("{:.3}", m.calmar));

    section(&mut out, "DRAWDOWN");
    row(&mut out, "Max drawdown", pct(m.max_drawdown));
    row(&mut out, "Avg drawdown", pct(m.avg_drawdown));
    row(&mut out, "Max duration (bars)", m.max_drawdown_duration.to_string());

    section(&mut out, "TRADE STATISTICS");
    match &m.trades {
        TradeStats::NoTrades => row(&mut out, "Trades", "0 (n/a)".to_string()),
        TradeStats::Computed {
            trade_count,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_bars_held,
        } => {
            row(&mut out, "Trades", trade_count.to_string());
            row(&mut out, "Win rate", pct(*win_rate));
            row(&mut out, "Profit factor", profit_factor.to_string());
            row(&mut out, "Avg win", format!("{avg_win:.2}"));
            row(&mut out, "Avg loss", format!("{avg_loss:.2}"));
            row(&mut out, "Largest win", format!("{largest_win:.2}"));
            row(&mut out, "Largest loss", format!("{largest_loss:.2}"));
            row(&mut out, "Avg bars held", format!("{avg_bars_held:.1}"));
        }
    }

    section(&mut out, "MARKET COMPARISON");
    let bench: &str = if report.benchmark.is_empty() { "none" } else { &report.benchmark };
    row(&mut out, "Benchmark", bench.to_string());
    match &m.market {
        MarketComparison::Unavailable => row(&mut out, "Alpha / beta", "n/a".to_string()),
        MarketComparison::Computed {
            alpha,
            beta,
            information_ratio,
            benchmark_return,
        } => {
            row(&mut out, "Benchmark return", pct(*benchmark_return));
            row(&mut out, "Alpha (daily)", format!("{alpha:.6}"));
            row(&mut out, "Beta", format!("{beta:.3}"));
            row(&mut out, "Information ratio", format!("{information_ratio:.3}"));
        }
    }

    section(&mut out, "RISK METRICS");
    row(&mut out, "VaR 95% (daily)", pct(m.var_95));
    row(&mut out, "CVaR 95% (daily)", pct(m.cvar_95));

    let _ = writeln!(out, "{RULE}");
    out
}

/// Fixed-width comparison table, in row order.
pub fn comparison_table(rows: &[ComparisonRow]) -> String {
    let mut out = String::with_capacity(128 + rows.len() * 96);
    let _ = writeln!(
        out,
        "{:<24} {:>10} {:>10} {:>8} {:>9} {:>9} {:>7}",
        "strategy", "return", "annual", "sharpe", "max dd", "win rate", "trades"
    );
    let _ = writeln!(out, "{}", "-".repeat(83));
    for r in rows {
        let win_rate = r.win_rate.map(pct).unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "{:<24} {:>10} {:>10} {:>8.3} {:>9} {:>9} {:>7}",
            truncate(&r.name, 24),
            pct(r.total_return),
            pct(r.annualized_return),
            r.sharpe,
            pct(r.max_drawdown),
            win_rate,
            r.trade_count
        );
    }
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}");
}

fn row(out: &mut String, label: &str, value: String) {
    let _ = writeln!(out, "  {label:<22}{value:>16}");
}

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
