//! Bar-by-bar event loop.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::execution::{execute_delta, Fill};
use super::state::{EngineConfig, RunResult, TradingMode};
use super::universe::Universe;
use crate::domain::{Bar, BarSeries, Direction, ExitReason, Marks, PortfolioState, Signal, SignalSeries, Trade};
use crate::error::{EngineError, SimulationInvariantError};
use crate::risk::{RiskContext, RiskManager};

/// Slack for floating-point accounting checks, relative to initial capital.
const ACCOUNTING_TOLERANCE: f64 = 1e-7;

/// Run a single-instrument backtest.
pub fn run(bars: &BarSeries, signals: &SignalSeries, config: &EngineConfig) -> Result<RunResult, EngineError> {
    let universe = Universe::single(bars, signals)?;
    run_universe(&universe, config)
}

/// Run a backtest over every feed of `universe`.
///
/// Fails before the first bar on invalid config, and mid-run only on a
/// broken accounting invariant.
pub fn run_universe(universe: &Universe<'_>, config: &EngineConfig) -> Result<RunResult, EngineError> {
    config.validate()?;
    let risk = config.risk_manager()?;
    run_loop(universe, config, &risk)
}

/// Run with a caller-built Risk Manager (for example one with a custom
/// `PositionSizer`). The manager's limits replace those in `config`.
pub fn run_with_risk(
    universe: &Universe<'_>,
    config: &EngineConfig,
    risk: &RiskManager,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    run_loop(universe, config, risk)
}

fn run_loop(universe: &Universe<'_>, config: &EngineConfig, risk: &RiskManager) -> Result<RunResult, EngineError> {
    let timestamps = universe.timestamps();
    let num_bars = universe.len();
    let mut state = PortfolioState::new(config.initial_capital);
    state.equity_curve.reserve(num_bars);
    let mut trades: Vec<Trade> = Vec::new();

    tracing::debug!(
        instruments = universe.feeds().len(),
        bars = num_bars,
        sizer = risk.sizer_name(),
        "backtest start"
    );

    let fill = |ts: NaiveDate, reason: ExitReason| Fill::new(ts, reason, &timestamps).with_commission(config.commission);

    for t in 0..num_bars {
        let ts = timestamps[t];
        let marks = universe.marks_at(t);

        // ─── Mark-to-market ───
        state.mark_to_market(ts, &marks);

        // ─── Exits ───
        if risk.drawdown_breached(&state) && !state.trading_halted {
            state.trading_halted = true;
            tracing::info!(
                date = %ts,
                drawdown = state.current_drawdown,
                limit = risk.limits().max_drawdown_pct,
                "drawdown limit breached, trading halted"
            );
        }

        let mut forced: BTreeSet<&str> = BTreeSet::new();
        for feed in universe.feeds() {
            let instrument = feed.instrument();
            let price = marks[instrument];
            if let Some(reason) = risk.check_exit(&state, instrument, price) {
                let quantity = state.quantity(instrument);
                tracing::debug!(date = %ts, instrument, quantity, price, reason = %reason, "forced exit");
                let exec = execute_delta(&mut state, instrument, -quantity, price, fill(ts, reason));
                trades.extend(exec.trades);
                forced.insert(instrument);
            }
        }

        // ─── Signals ───
        if !state.trading_halted {
            let histories: Vec<(&str, &[Bar])> = universe
                .feeds()
                .iter()
                .map(|feed| (feed.instrument(), &feed.bars.bars()[..=t]))
                .collect();
            let groups = risk.groups_at(&histories);

            for feed in universe.feeds() {
                let instrument = feed.instrument();
                if forced.contains(instrument) {
                    continue;
                }
                let Some(raw) = feed.signal(t) else {
                    continue;
                };
                let signal = apply_trading_mode(raw, config.trading_mode);
                let ctx = RiskContext::new(instrument, &feed.bars.bars()[..=t], &marks).with_groups(&groups);
                let decision = risk.evaluate(&state, &ctx, &signal);
                if decision.is_hold() {
                    continue;
                }

                let price = marks[instrument];
                let reason = decision.exit_reason.unwrap_or(ExitReason::Signal);
                let exec = execute_delta(
                    &mut state,
                    instrument,
                    decision.approved_quantity_delta,
                    price,
                    fill(ts, reason),
                );
                tracing::debug!(
                    date = %ts,
                    instrument,
                    delta = decision.approved_quantity_delta,
                    price,
                    "fill"
                );
                if exec.long_units_bought > 0.0 && state.cash < -ACCOUNTING_TOLERANCE * state.initial_capital {
                    return Err(invariant(
                        &state,
                        ts,
                        format!(
                            "buying {} {instrument} at {price} left cash at {}",
                            exec.long_units_bought, state.cash
                        ),
                    )
                    .into());
                }
                trades.extend(exec.trades);
            }
        }

        // ─── Final bar: close whatever is still open ───
        if t + 1 == num_bars {
            trades.extend(close_all(&mut state, &marks, fill(ts, ExitReason::Signal)));
        }

        // ─── Post-execution ───
        state.record_post_execution(&marks);
        check_conservation(&state, &marks, ts)?;
    }

    tracing::debug!(
        trades = trades.len(),
        final_equity = state.last_equity(),
        halted = state.trading_halted,
        "backtest done"
    );

    Ok(RunResult {
        instruments: universe.instruments().map(str::to_string).collect(),
        trades,
        equity_curve: state.equity_curve.clone(),
        final_state: state,
    })
}

fn apply_trading_mode(signal: &Signal, mode: TradingMode) -> Signal {
    match (mode, signal.direction) {
        (TradingMode::LongOnly, Direction::Short) => Signal::flat(signal.timestamp),
        _ => *signal,
    }
}

fn close_all(state: &mut PortfolioState, marks: &Marks, fill: Fill<'_>) -> Vec<Trade> {
    let open: Vec<(String, f64)> = state
        .positions
        .iter()
        .map(|(name, pos)| (name.clone(), pos.quantity))
        .collect();
    let mut trades = Vec::with_capacity(open.len());
    for (instrument, quantity) in open {
        let price = marks.get(&instrument).copied().unwrap_or_else(|| {
            state
                .position(&instrument)
                .map_or(0.0, |p| p.entry_price)
        });
        let exec = execute_delta(state, &instrument, -quantity, price, fill);
        trades.extend(exec.trades);
    }
    trades
}

/// Realized plus unrealized pnl must equal equity minus initial capital.
fn check_conservation(state: &PortfolioState, marks: &Marks, ts: NaiveDate) -> Result<(), SimulationInvariantError> {
    let equity = state.equity(marks);
    if !equity.is_finite() {
        return Err(invariant(state, ts, format!("equity is not finite: {equity}")));
    }
    let pnl = state.realized_pnl + state.unrealized_pnl(marks);
    let diff = (pnl - (equity - state.initial_capital)).abs();
    if diff > ACCOUNTING_TOLERANCE * state.initial_capital.max(1.0) {
        return Err(invariant(
            state,
            ts,
            format!(
                "pnl does not reconcile: realized {} + unrealized {} vs equity change {}",
                state.realized_pnl,
                state.unrealized_pnl(marks),
                equity - state.initial_capital
            ),
        ));
    }
    Ok(())
}

fn invariant(state: &PortfolioState, timestamp: NaiveDate, message: String) -> SimulationInvariantError {
    tracing::error!(date = %timestamp, %message, "simulation invariant violated");
    SimulationInvariantError {
        timestamp,
        message,
        state: Box::new(state.clone()),
    }
}
