//! Backtesting engine: the bar-by-bar simulation loop.
//!
//! Per bar, in timestamp order:
//!
//! 1. Mark-to-market: append (timestamp, equity), update peak and drawdown
//! 2. Exits: drawdown halt, stop loss, trailing stop and take profit,
//!    instruments in sorted order
//! 3. Signals: size, approve and execute at the bar's close (skipped for
//!    instruments force-closed this bar, and for the rest of the run once halted)
//! 4. Post-execution: overwrite the bar's equity point, check invariants
//!
//! The loop is pure computation over pre-fetched data. Identical inputs give
//! identical trades and equity curves.

pub mod execution;
pub mod loop_runner;
pub mod state;
pub mod universe;

pub use execution::{execute_delta, Execution, Fill};
pub use loop_runner::{run, run_universe, run_with_risk};
pub use state::{EngineConfig, RunResult, TradingMode};
pub use universe::{InstrumentFeed, Universe};
