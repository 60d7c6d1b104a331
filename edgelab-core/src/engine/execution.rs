//! Fill application: turns an approved quantity delta into cash, position
//! and trade-log changes at a single price.
//!
//! Fills are instantaneous at the bar's close. Each fill pays a fixed
//! commission. Closing (fully or partially) emits a Trade with
//! `pnl = closed_quantity * (price - entry_price) - fees`; opening or scaling
//! in emits nothing and the position carries the fee until it is closed. A
//! reversal closes first, then opens, as one fill.

use chrono::NaiveDate;

use crate::domain::{ExitReason, PortfolioState, Position, Trade};

/// Bar, reason and cost of one fill.
#[derive(Debug, Clone, Copy)]
pub struct Fill<'a> {
    pub timestamp: NaiveDate,
    pub reason: ExitReason,
    pub commission: f64,
    /// The run's bar axis, used to count bars held.
    pub timestamps: &'a [NaiveDate],
}

impl<'a> Fill<'a> {
    pub fn new(timestamp: NaiveDate, reason: ExitReason, timestamps: &'a [NaiveDate]) -> Self {
        Self {
            timestamp,
            reason,
            commission: 0.0,
            timestamps,
        }
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub trades: Vec<Trade>,
    /// Units bought to open or add to a long (not short covers).
    pub long_units_bought: f64,
}

/// Apply `delta` units of `instrument` at `price`.
pub fn execute_delta(
    state: &mut PortfolioState,
    instrument: &str,
    delta: f64,
    price: f64,
    fill: Fill<'_>,
) -> Execution {
    let mut out = Execution::default();
    if delta == 0.0 {
        return out;
    }

    let fee = fill.commission;
    state.cash -= fee;

    let current = state.quantity(instrument);
    let target = current + delta;
    let flips = current != 0.0 && (target == 0.0 || target.signum() != current.signum());
    let shrinks = current != 0.0 && !flips && target.abs() < current.abs();

    let mut fee_charged = false;
    if flips || shrinks {
        let closed = if flips { current } else { current - target };
        if let Some(trade) = close_portion(state, instrument, closed, price, fee, &fill) {
            out.trades.push(trade);
            fee_charged = true;
        }
    }

    let held = state.quantity(instrument);
    let opening = target - held;
    if opening != 0.0 {
        state.cash -= opening * price;
        let pos = state
            .positions
            .entry(instrument.to_string())
            .and_modify(|pos| pos.scale_in(opening, price))
            .or_insert_with(|| Position::new(instrument, opening, price, fill.timestamp));
        if !fee_charged {
            pos.fees += fee;
        }
        if opening > 0.0 {
            out.long_units_bought = opening;
        }
    }

    out
}

/// Close `closed` units (signed like the position) and record the trade.
///
/// The trade pays `exit_fee` plus the carried entry fees in proportion to
/// the units closed.
fn close_portion(
    state: &mut PortfolioState,
    instrument: &str,
    closed: f64,
    price: f64,
    exit_fee: f64,
    fill: &Fill<'_>,
) -> Option<Trade> {
    let pos = state.positions.get_mut(instrument)?;
    let entry_fees = pos.fees * (closed / pos.quantity);
    let fees = entry_fees + exit_fee;
    let pnl = closed * (price - pos.entry_price) - fees;
    let trade = Trade {
        instrument: instrument.to_string(),
        entry_timestamp: pos.entry_timestamp,
        exit_timestamp: fill.timestamp,
        entry_price: pos.entry_price,
        exit_price: price,
        quantity: closed,
        pnl,
        fees,
        exit_reason: fill.reason,
        bars_held: bars_between(fill.timestamps, pos.entry_timestamp, fill.timestamp),
    };

    pos.quantity -= closed;
    pos.fees -= entry_fees;
    if pos.quantity == 0.0 {
        state.positions.remove(instrument);
    }
    state.cash += closed * price;
    state.realized_pnl += pnl;
    Some(trade)
}

fn bars_between(timestamps: &[NaiveDate], entry: NaiveDate, exit: NaiveDate) -> usize {
    let from = timestamps.partition_point(|t| *t < entry);
    let to = timestamps.partition_point(|t| *t < exit);
    to.saturating_sub(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn axis() -> Vec<NaiveDate> {
        (0..10).map(day).collect()
    }

    fn open_long_with_fee(s: &mut PortfolioState, axis: &[NaiveDate]) {
        let fill = Fill::new(day(0), ExitReason::Signal, axis).with_commission(1.0);
        execute_delta(s, "SPY", 10.0, 100.0, fill);
    }

    #[test]
    fn open_then_close_long() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        let open = execute_delta(&mut s, "SPY", 10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        assert!(open.trades.is_empty());
        assert_eq!(open.long_units_bought, 10.0);
        assert_eq!(s.cash, 9_000.0);

        let close = execute_delta(&mut s, "SPY", -10.0, 110.0, Fill::new(day(3), ExitReason::TakeProfit, &axis));
        assert_eq!(close.trades.len(), 1);
        let t = &close.trades[0];
        assert_eq!(t.pnl, 100.0);
        assert_eq!(t.bars_held, 3);
        assert_eq!(t.exit_reason, ExitReason::TakeProfit);
        assert!(!s.has_position("SPY"));
        assert_eq!(s.cash, 10_100.0);
        assert_eq!(s.realized_pnl, 100.0);
    }

    #[test]
    fn short_round_trip() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        execute_delta(&mut s, "SPY", -10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        assert_eq!(s.cash, 11_000.0);
        let out = execute_delta(&mut s, "SPY", 10.0, 90.0, Fill::new(day(1), ExitReason::Signal, &axis));
        assert_eq!(out.trades[0].pnl, 100.0);
        assert_eq!(out.trades[0].quantity, -10.0);
        assert_eq!(out.long_units_bought, 0.0);
        assert_eq!(s.cash, 10_100.0);
    }

    #[test]
    fn reversal_emits_close_then_opens() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        execute_delta(&mut s, "SPY", 10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        let out = execute_delta(&mut s, "SPY", -25.0, 105.0, Fill::new(day(2), ExitReason::Signal, &axis));
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].pnl, 50.0);
        let pos = s.position("SPY").unwrap();
        assert_eq!(pos.quantity, -15.0);
        assert_eq!(pos.entry_price, 105.0);
        assert_eq!(pos.entry_timestamp, day(2));
    }

    #[test]
    fn scale_in_averages_entry_without_trade() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        execute_delta(&mut s, "SPY", 10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        let out = execute_delta(&mut s, "SPY", 10.0, 110.0, Fill::new(day(1), ExitReason::Signal, &axis));
        assert!(out.trades.is_empty());
        assert_eq!(s.position("SPY").unwrap().entry_price, 105.0);
        assert_eq!(s.cash, 7_900.0);
    }

    #[test]
    fn scale_out_emits_partial_trade() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        execute_delta(&mut s, "SPY", 10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        let out = execute_delta(&mut s, "SPY", -4.0, 120.0, Fill::new(day(1), ExitReason::Signal, &axis));
        assert_eq!(out.trades[0].quantity, 4.0);
        assert_eq!(out.trades[0].pnl, 80.0);
        assert_eq!(s.quantity("SPY"), 6.0);
        assert_eq!(s.position("SPY").unwrap().entry_price, 100.0);
    }

    #[test]
    fn accounting_identity_holds() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        execute_delta(&mut s, "SPY", 10.0, 100.0, Fill::new(day(0), ExitReason::Signal, &axis));
        execute_delta(&mut s, "SPY", 5.0, 104.0, Fill::new(day(1), ExitReason::Signal, &axis));
        execute_delta(&mut s, "SPY", -8.0, 97.0, Fill::new(day(2), ExitReason::Signal, &axis));
        let marks: crate::domain::Marks = [("SPY".to_string(), 101.0)].into_iter().collect();
        let lhs = s.realized_pnl + s.unrealized_pnl(&marks);
        let rhs = s.equity(&marks) - s.initial_capital;
        assert!((lhs - rhs).abs() < 1e-9, "{lhs} vs {rhs}");
    }

    #[test]
    fn commission_is_carried_then_charged_to_the_trade() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        open_long_with_fee(&mut s, &axis);
        assert_eq!(s.cash, 8_999.0);
        assert_eq!(s.position("SPY").unwrap().fees, 1.0);
        assert_eq!(s.realized_pnl, 0.0);

        let fill = Fill::new(day(2), ExitReason::Signal, &axis).with_commission(1.0);
        let out = execute_delta(&mut s, "SPY", -10.0, 110.0, fill);
        let t = &out.trades[0];
        assert_eq!(t.fees, 2.0);
        assert_eq!(t.pnl, 98.0);
        assert_eq!(s.cash, 10_098.0);
        assert_eq!(s.realized_pnl, 98.0);
    }

    #[test]
    fn partial_close_takes_a_share_of_entry_fees() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        open_long_with_fee(&mut s, &axis);
        let fill = Fill::new(day(1), ExitReason::Signal, &axis).with_commission(1.0);
        let out = execute_delta(&mut s, "SPY", -4.0, 100.0, fill);
        assert!((out.trades[0].fees - 1.4).abs() < 1e-12);
        assert!((s.position("SPY").unwrap().fees - 0.6).abs() < 1e-12);
    }

    #[test]
    fn reversal_pays_one_commission() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        open_long_with_fee(&mut s, &axis);
        let fill = Fill::new(day(1), ExitReason::Signal, &axis).with_commission(1.0);
        let out = execute_delta(&mut s, "SPY", -20.0, 100.0, fill);
        assert_eq!(out.trades[0].fees, 2.0);
        let pos = s.position("SPY").unwrap();
        assert_eq!(pos.quantity, -10.0);
        assert_eq!(pos.fees, 0.0);
        assert_eq!(s.cash, 10_998.0);
    }

    #[test]
    fn accounting_identity_holds_with_commission() {
        let axis = axis();
        let mut s = PortfolioState::new(10_000.0);
        open_long_with_fee(&mut s, &axis);
        let fill = |d| Fill::new(day(d), ExitReason::Signal, &axis).with_commission(2.5);
        execute_delta(&mut s, "SPY", 5.0, 104.0, fill(1));
        execute_delta(&mut s, "SPY", -8.0, 97.0, fill(2));
        execute_delta(&mut s, "SPY", -12.0, 99.0, fill(3));
        let marks: crate::domain::Marks = [("SPY".to_string(), 101.0)].into_iter().collect();
        let lhs = s.realized_pnl + s.unrealized_pnl(&marks);
        let rhs = s.equity(&marks) - s.initial_capital;
        assert!((lhs - rhs).abs() < 1e-9, "{lhs} vs {rhs}");
    }
}
