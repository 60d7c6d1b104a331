//! PortfolioState: cash, open positions and the equity curve of one run.

use super::position::Position;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current close per instrument for the bar being processed.
pub type Marks = BTreeMap<String, f64>;

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDate,
    pub equity: f64,
}

/// Aggregate portfolio state.
///
/// Single mutable instance per run, advanced strictly in timestamp order by the
/// engine. The accounting identity must hold at every bar:
/// `equity == cash + sum(quantity * close)` and
/// `realized_pnl + unrealized_pnl == equity - initial_capital`.
///
/// Positions live in a `BTreeMap` so iteration order (and therefore the
/// simulation) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_capital: f64,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub equity_curve: Vec<EquityPoint>,
    pub peak_equity: f64,
    pub current_drawdown: f64,
    /// Sum of pnl over every trade emitted so far. Entry fees of open
    /// positions are carried in their unrealized pnl instead.
    pub realized_pnl: f64,
    /// Set once the drawdown limit is breached; no new entries afterwards.
    pub trading_halted: bool,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            equity_curve: Vec::new(),
            peak_equity: initial_capital,
            current_drawdown: 0.0,
            realized_pnl: 0.0,
            trading_halted: false,
        }
    }

    /// Total equity = cash + sum of position market values.
    ///
    /// Positions without a mark are valued at their entry price.
    pub fn equity(&self, marks: &Marks) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| pos.market_value(mark_for(marks, pos)))
            .sum();
        self.cash + position_value
    }

    pub fn unrealized_pnl(&self, marks: &Marks) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.unrealized_pnl(mark_for(marks, pos)))
            .sum()
    }

    /// Gross exposure summed over the given instruments.
    pub fn exposure_of<'a>(&self, instruments: impl IntoIterator<Item = &'a str>, marks: &Marks) -> f64 {
        instruments
            .into_iter()
            .filter_map(|inst| self.positions.get(inst))
            .map(|pos| pos.exposure(mark_for(marks, pos)))
            .sum()
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Signed quantity held in `instrument` (0 if flat).
    pub fn quantity(&self, instrument: &str) -> f64 {
        self.positions.get(instrument).map_or(0.0, |p| p.quantity)
    }

    /// Mark-to-market: append an equity point, update peak and drawdown, and
    /// fold each mark into its position's best price.
    pub fn mark_to_market(&mut self, timestamp: NaiveDate, marks: &Marks) -> f64 {
        for pos in self.positions.values_mut() {
            if let Some(price) = marks.get(&pos.instrument) {
                pos.track(*price);
            }
        }
        let equity = self.equity(marks);
        self.equity_curve.push(EquityPoint { timestamp, equity });
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        self.current_drawdown = if self.peak_equity > 0.0 {
            ((self.peak_equity - equity) / self.peak_equity).max(0.0)
        } else {
            0.0
        };
        equity
    }

    /// Overwrite the equity of the latest point after execution at the same bar.
    pub fn record_post_execution(&mut self, marks: &Marks) -> f64 {
        let equity = self.equity(marks);
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = equity;
        }
        equity
    }

    pub fn last_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

fn mark_for(marks: &Marks, pos: &Position) -> f64 {
    marks
        .get(&pos.instrument)
        .copied()
        .unwrap_or(pos.entry_price)
}
