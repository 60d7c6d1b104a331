//! Engine scenarios over hand-built bar and signal series.
//!
//! Each test pins one behaviour of the bar loop: flat runs, the final forced
//! close, stop-loss and trailing-stop exits, the drawdown halt, reversals,
//! commissions, the correlated exposure cap (fixed and detected) and input
//! validation.

use chrono::NaiveDate;
use edgelab_core::domain::{BarSeries, Direction, ExitReason, Signal, SignalSeries};
use edgelab_core::engine::{run, run_universe, EngineConfig, InstrumentFeed, TradingMode, Universe};
use edgelab_core::error::{EngineError, InputError};
use edgelab_core::risk::{CorrelationDetection, CorrelationGroups, RiskLimits};

const CAPITAL: f64 = 10_000.0;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

fn series(instrument: &str, closes: &[f64]) -> BarSeries {
    BarSeries::from_closes(instrument, closes.iter().enumerate().map(|(i, c)| (day(i), *c))).unwrap()
}

fn signals(directions: &[Direction]) -> SignalSeries {
    SignalSeries::new(
        directions
            .iter()
            .enumerate()
            .map(|(i, d)| Signal::new(day(i), *d, d.sign()))
            .collect(),
    )
}

fn config(limits: RiskLimits) -> EngineConfig {
    EngineConfig::new(CAPITAL).with_limits(limits)
}

fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ── Scenario A: always flat ──────────────────────────────────────────

#[test]
fn flat_signals_never_trade() {
    let bars = series("SPY", &[100.0, 97.0, 104.0, 110.0, 90.0, 101.0]);
    let sigs = SignalSeries::flat_for(&bars);

    let result = run(&bars, &sigs, &config(RiskLimits::default())).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), bars.len());
    for point in &result.equity_curve {
        assert_eq!(point.equity, CAPITAL);
    }
    assert!(!result.halted());
}

// ── Scenario B: one long held to the end ─────────────────────────────

#[test]
fn long_held_to_end_closes_once_on_final_bar() {
    let closes: Vec<f64> = (0..=10).map(|i| 100.0 + 5.0 * i as f64).collect();
    let bars = series("SPY", &closes);
    let sigs = signals(&[Direction::Long; 11]);
    let limits = RiskLimits {
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    // 0.2 of 10_000 at 100 per unit
    assert_eq!(trade.quantity, 20.0);
    assert_eq!(trade.entry_price, 100.0);
    assert_eq!(trade.exit_price, 150.0);
    assert_approx(trade.pnl, 20.0 * (150.0 - 100.0));
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_eq!(trade.entry_timestamp, day(0));
    assert_eq!(trade.exit_timestamp, day(10));
    assert_eq!(trade.bars_held, 10);

    assert_approx(result.final_equity(), CAPITAL + 1_000.0);
    assert!(result.final_state.positions.is_empty());
}

// ── Scenario C: stop loss ────────────────────────────────────────────

#[test]
fn stop_loss_exits_on_the_breaching_bar() {
    let bars = series("SPY", &[100.0, 90.0, 91.0]);
    let sigs = signals(&[Direction::Long, Direction::Long, Direction::Flat]);
    let limits = RiskLimits {
        stop_loss_pct: 0.05,
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_timestamp, day(1));
    assert_eq!(trade.exit_price, 90.0);
    assert_approx(trade.pnl, 20.0 * (90.0 - 100.0));
}

#[test]
fn forced_exit_suppresses_same_bar_entry() {
    // Bar 1 stops out while the signal still says LONG; re-entry waits for bar 2.
    let bars = series("SPY", &[100.0, 90.0, 91.0, 92.0]);
    let sigs = signals(&[Direction::Long; 4]);
    let limits = RiskLimits {
        stop_loss_pct: 0.05,
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_eq!(result.trades[1].entry_timestamp, day(2));
    assert_eq!(result.trades[1].entry_price, 91.0);
}

// ── Scenario D: drawdown halt ────────────────────────────────────────

#[test]
fn drawdown_halt_closes_everything_and_blocks_entries() {
    let bars = series("SPY", &[100.0, 85.0, 90.0, 95.0, 99.0]);
    let sigs = signals(&[Direction::Long; 5]);
    let limits = RiskLimits {
        max_position_size_fraction: 1.0,
        max_drawdown_pct: 0.10,
        stop_loss_pct: 0.5,
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::DrawdownHalt);
    assert_eq!(trade.exit_timestamp, day(1));
    assert_approx(trade.pnl, 100.0 * (85.0 - 100.0));

    assert!(result.halted());
    // Flat from the halt on: equity no longer follows the price.
    for point in &result.equity_curve[1..] {
        assert_approx(point.equity, 8_500.0);
    }
}

#[test]
fn drawdown_halt_closes_every_instrument_on_the_same_bar() {
    let a = series("AAA", &[100.0, 85.0, 90.0, 95.0]);
    let b = series("BBB", &[100.0, 85.0, 80.0, 99.0]);
    let sa = signals(&[Direction::Long; 4]);
    let sb = signals(&[Direction::Long; 4]);
    let universe = Universe::new(vec![InstrumentFeed::new(&a, &sa), InstrumentFeed::new(&b, &sb)]).unwrap();
    let limits = RiskLimits {
        max_position_size_fraction: 0.5,
        max_drawdown_pct: 0.10,
        stop_loss_pct: 0.5,
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };

    let result = run_universe(&universe, &config(limits)).unwrap();

    assert!(result.halted());
    assert_eq!(result.trades.len(), 2);
    for (trade, name) in result.trades.iter().zip(["AAA", "BBB"]) {
        assert_eq!(trade.instrument, name);
        assert_eq!(trade.quantity, 50.0);
        assert_eq!(trade.exit_reason, ExitReason::DrawdownHalt);
        assert_eq!(trade.exit_timestamp, day(1));
    }
    assert!(result.final_state.positions.is_empty());
    for point in &result.equity_curve[1..] {
        assert_approx(point.equity, 8_500.0);
    }
}

// ── Trailing stop ────────────────────────────────────────────────────

#[test]
fn trailing_stop_fires_on_give_back_from_the_high() {
    let bars = series("SPY", &[100.0, 110.0, 120.0, 113.0, 115.0]);
    let sigs = signals(&[Direction::Long; 5]);
    let limits = RiskLimits {
        stop_loss_pct: 0.5,
        take_profit_pct: 10.0,
        trailing_stop_pct: Some(0.05),
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();

    assert_eq!(result.trades.len(), 2);
    let stopped = &result.trades[0];
    assert_eq!(stopped.exit_reason, ExitReason::TrailingStop);
    assert_eq!(stopped.exit_timestamp, day(3));
    assert_eq!(stopped.exit_price, 113.0);
    assert_approx(stopped.pnl, 20.0 * 13.0);
    // No re-entry on the stop bar.
    assert_eq!(result.trades[1].entry_timestamp, day(4));
}

// ── Commission ───────────────────────────────────────────────────────

#[test]
fn commission_is_charged_per_fill_and_netted_into_pnl() {
    let closes: Vec<f64> = (0..=10).map(|i| 100.0 + 5.0 * i as f64).collect();
    let bars = series("SPY", &closes);
    let sigs = signals(&[Direction::Long; 11]);
    let limits = RiskLimits {
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_commission(1.0);

    let result = run(&bars, &sigs, &cfg).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.fees, 2.0);
    assert_approx(trade.pnl, 20.0 * 50.0 - 2.0);
    assert_approx(result.equity_curve[0].equity, CAPITAL - 1.0);
    assert_approx(result.final_equity(), CAPITAL + result.realized_pnl());
}

#[test]
fn commission_counts_against_cash_for_full_size_buys() {
    let bars = series("SPY", &[100.0, 100.0]);
    let sigs = signals(&[Direction::Long; 2]);
    let limits = RiskLimits {
        max_position_size_fraction: 1.0,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_commission(1.0);

    let result = run(&bars, &sigs, &cfg).unwrap();

    // 100 units would need 10_001 with the fee.
    assert_eq!(result.trades[0].quantity, 99.0);
    assert!(result.final_state.cash >= 0.0);
}

// ── Trading mode ─────────────────────────────────────────────────────

#[test]
fn long_only_treats_short_as_flat() {
    let bars = series("SPY", &[100.0, 99.0, 98.0, 97.0]);
    let sigs = signals(&[Direction::Short; 4]);
    let limits = RiskLimits {
        stop_loss_pct: 0.5,
        ..RiskLimits::default()
    };

    let result = run(&bars, &sigs, &config(limits)).unwrap();
    assert!(result.trades.is_empty());
}

#[test]
fn long_short_profits_from_a_falling_market() {
    let bars = series("SPY", &[100.0, 99.0, 98.0, 97.0]);
    let sigs = signals(&[Direction::Short; 4]);
    let limits = RiskLimits {
        stop_loss_pct: 0.5,
        take_profit_pct: 0.5,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_trading_mode(TradingMode::LongShort);

    let result = run(&bars, &sigs, &cfg).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.quantity, -20.0);
    assert_approx(trade.pnl, 20.0 * (100.0 - 97.0));
    assert_approx(result.final_equity(), CAPITAL + 60.0);
}

#[test]
fn reversal_closes_and_reopens_on_the_same_bar() {
    let bars = series("SPY", &[100.0, 101.0, 102.0, 103.0]);
    let sigs = signals(&[Direction::Long, Direction::Long, Direction::Short, Direction::Short]);
    let limits = RiskLimits {
        stop_loss_pct: 0.5,
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_trading_mode(TradingMode::LongShort);

    let result = run(&bars, &sigs, &cfg).unwrap();

    assert_eq!(result.trades.len(), 2);
    let closed = &result.trades[0];
    assert_eq!(closed.quantity, 20.0);
    assert_eq!(closed.exit_reason, ExitReason::Signal);
    assert_eq!(closed.exit_timestamp, day(2));
    assert_eq!(closed.exit_price, 102.0);
    assert_approx(closed.pnl, 40.0);

    // floor(0.2 * 10_040 / 102) units short, opened where the long closed
    let short = &result.trades[1];
    assert_eq!(short.quantity, -19.0);
    assert_eq!(short.entry_timestamp, closed.exit_timestamp);
    assert_eq!(short.entry_price, 102.0);
    assert_approx(short.pnl, -19.0);
}

// ── Multi-instrument ─────────────────────────────────────────────────

#[test]
fn correlated_group_exposure_is_capped() {
    let a = series("AAA", &[100.0, 100.0, 100.0]);
    let b = series("BBB", &[100.0, 100.0, 100.0]);
    let sa = signals(&[Direction::Long; 3]);
    let sb = signals(&[Direction::Long; 3]);
    let universe = Universe::new(vec![InstrumentFeed::new(&b, &sb), InstrumentFeed::new(&a, &sa)]).unwrap();

    let limits = RiskLimits {
        max_correlated_exposure_fraction: 0.3,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_correlation(CorrelationGroups::new().with_group(["AAA", "BBB"]));

    let result = run_universe(&universe, &cfg).unwrap();

    assert_eq!(result.instruments, vec!["AAA".to_string(), "BBB".to_string()]);
    let qty = |name: &str| {
        result
            .trades
            .iter()
            .find(|t| t.instrument == name)
            .map(|t| t.quantity)
            .unwrap()
    };
    // AAA is evaluated first and takes its full 20 units; BBB gets what is left of 3_000.
    assert_eq!(qty("AAA"), 20.0);
    assert_eq!(qty("BBB"), 10.0);
}

fn detected_pair_run(bbb: &[f64], directions: &[Direction]) -> (f64, NaiveDate) {
    let a = series("AAA", &[100.0, 102.0, 101.0, 104.0, 103.0, 106.0, 105.0, 108.0]);
    let b = series("BBB", bbb);
    let sa = signals(directions);
    let sb = signals(directions);
    let universe = Universe::new(vec![InstrumentFeed::new(&a, &sa), InstrumentFeed::new(&b, &sb)]).unwrap();
    let limits = RiskLimits {
        max_correlated_exposure_fraction: 0.3,
        stop_loss_pct: 0.5,
        take_profit_pct: 10.0,
        ..RiskLimits::default()
    };
    let cfg = config(limits).with_correlation_detection(CorrelationDetection::new(0.9));

    let result = run_universe(&universe, &cfg).unwrap();
    let trade = result.trades.iter().find(|t| t.instrument == "BBB").unwrap();
    (trade.quantity, trade.entry_timestamp)
}

const COMOVING: [f64; 8] = [100.0, 102.0, 101.0, 104.0, 103.0, 106.0, 105.0, 108.0];
const MIRRORED: [f64; 8] = [100.0, 98.0, 99.0, 96.0, 97.0, 94.0, 95.0, 92.0];

#[test]
fn detected_correlation_ignores_later_bars() {
    // Only bars 1.. differ between the two runs; the bar-0 entry must not.
    let longs = [Direction::Long; 8];
    let comoving = detected_pair_run(&COMOVING, &longs);
    let mirrored = detected_pair_run(&MIRRORED, &longs);

    assert_eq!(comoving, (20.0, day(0)));
    assert_eq!(mirrored, (20.0, day(0)));
}

#[test]
fn detected_correlation_caps_entries_once_history_shows_it() {
    let mut late = [Direction::Flat; 8];
    late[5..].fill(Direction::Long);

    // By bar 5 five co-moving returns are visible: AAA takes floor(2_000 / 106),
    // BBB only what is left of 3_000.
    assert_eq!(detected_pair_run(&COMOVING, &late), (10.0, day(5)));
    assert_eq!(detected_pair_run(&MIRRORED, &late), (21.0, day(5)));
}

#[test]
fn uncorrelated_instruments_size_independently() {
    let a = series("AAA", &[100.0, 100.0, 100.0]);
    let b = series("BBB", &[50.0, 50.0, 50.0]);
    let sa = signals(&[Direction::Long; 3]);
    let sb = signals(&[Direction::Long; 3]);
    let universe = Universe::new(vec![InstrumentFeed::new(&a, &sa), InstrumentFeed::new(&b, &sb)]).unwrap();

    let result = run_universe(&universe, &config(RiskLimits::default())).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].quantity, 20.0);
    assert_eq!(result.trades[1].quantity, 40.0);
}

// ── Validation ───────────────────────────────────────────────────────

#[test]
fn misaligned_signals_are_rejected_before_the_loop() {
    let bars = series("SPY", &[100.0, 101.0, 102.0]);
    let sigs = SignalSeries::new(vec![Signal::flat(day(0)), Signal::flat(day(5)), Signal::flat(day(2))]);

    let err = run(&bars, &sigs, &config(RiskLimits::default())).unwrap_err();
    assert!(matches!(err, EngineError::Input(InputError::Misaligned { index: 1, .. })));
}

#[test]
fn signal_length_mismatch_is_rejected() {
    let bars = series("SPY", &[100.0, 101.0, 102.0]);
    let sigs = signals(&[Direction::Long; 2]);

    let err = run(&bars, &sigs, &config(RiskLimits::default())).unwrap_err();
    assert!(matches!(err, EngineError::Input(InputError::LengthMismatch { .. })));
}

#[test]
fn out_of_range_limits_fail_before_any_bar() {
    let bars = series("SPY", &[100.0, 101.0]);
    let sigs = signals(&[Direction::Long; 2]);
    let limits = RiskLimits {
        max_position_size_fraction: 1.5,
        ..RiskLimits::default()
    };

    let err = run(&bars, &sigs, &config(limits)).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn unaligned_universe_is_rejected() {
    let a = series("AAA", &[100.0, 101.0]);
    let b = BarSeries::from_closes("BBB", [(day(0), 50.0), (day(3), 51.0)]).unwrap();
    let sa = SignalSeries::flat_for(&a);
    let sb = SignalSeries::flat_for(&b);

    let err = Universe::new(vec![InstrumentFeed::new(&a, &sa), InstrumentFeed::new(&b, &sb)]).unwrap_err();
    assert!(matches!(err, InputError::UnalignedUniverse { .. }));
}

#[test]
fn identical_inputs_give_identical_results() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0).collect();
    let bars = series("SPY", &closes);
    let directions: Vec<Direction> = (0..60)
        .map(|i| match i % 7 {
            0..=2 => Direction::Long,
            3 => Direction::Flat,
            _ => Direction::Short,
        })
        .collect();
    let sigs = signals(&directions);
    let cfg = config(RiskLimits::default()).with_trading_mode(TradingMode::LongShort);

    let first = run(&bars, &sigs, &cfg).unwrap();
    let second = run(&bars, &sigs, &cfg).unwrap();
    assert_eq!(first, second);
}
