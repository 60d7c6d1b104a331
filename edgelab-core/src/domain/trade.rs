//! Trade: immutable record of a full or partial position close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a position (or part of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TrailingStop,
    TakeProfit,
    DrawdownHalt,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Signal => "SIGNAL",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::DrawdownHalt => "DRAWDOWN_HALT",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed (or partially closed) position.
///
/// `quantity` keeps the sign of the closed position, so
/// `pnl == quantity * (exit_price - entry_price) - fees` for longs and shorts alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: String,
    pub entry_timestamp: NaiveDate,
    pub exit_timestamp: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net of `fees`.
    pub pnl: f64,
    /// Commissions charged to this trade: its share of the entry fills plus
    /// the closing fill.
    #[serde(default)]
    pub fees: f64,
    pub exit_reason: ExitReason,
    /// Bars between entry and exit.
    pub bars_held: usize,
}

impl Trade {
    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = (self.entry_price * self.quantity).abs();
        if notional == 0.0 {
            return 0.0;
        }
        self.pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            instrument: "SPY".into(),
            entry_timestamp: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            exit_timestamp: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            entry_price: 100.0,
            exit_price: 110.0,
            quantity: 50.0,
            pnl: 500.0,
            fees: 0.0,
            exit_reason: ExitReason::TakeProfit,
            bars_held: 4,
        }
    }

    #[test]
    fn return_pct_calculation() {
        let trade = sample_trade();
        assert!((trade.return_pct() - 0.1).abs() < 1e-10);
    }

    #[test]
    fn short_trade_return_uses_absolute_notional() {
        let mut trade = sample_trade();
        trade.quantity = -50.0;
        trade.exit_price = 90.0;
        trade.pnl = -50.0 * (90.0 - 100.0);
        assert!(trade.is_winner());
        assert!((trade.return_pct() - 0.1).abs() < 1e-10);
    }

    #[test]
    fn exit_reason_wire_names() {
        let json = serde_json::to_string(&ExitReason::DrawdownHalt).unwrap();
        assert_eq!(json, "\"DRAWDOWN_HALT\"");
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
        let trailing: ExitReason = serde_json::from_str("\"TRAILING_STOP\"").unwrap();
        assert_eq!(trailing, ExitReason::TrailingStop);
    }

    #[test]
    fn fees_default_when_absent() {
        let mut json = serde_json::to_value(sample_trade()).unwrap();
        json.as_object_mut().unwrap().remove("fees");
        let trade: Trade = serde_json::from_value(json).unwrap();
        assert_eq!(trade.fees, 0.0);
    }
}
