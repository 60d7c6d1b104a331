//! Error taxonomy for the engine.
//!
//! Three fatal classes, each raised at a different point of a run:
//! - `InputError`: malformed or misaligned bar/signal series, raised before the loop starts.
//! - `ConfigError`: out-of-range risk parameter, raised before any run begins.
//! - `SimulationInvariantError`: a logic defect detected mid-run. Carries the full
//!   portfolio state at the failing bar.
//!
//! Risk Manager rejections are not errors; they are zero-quantity decisions.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::PortfolioState;

/// Malformed or misaligned input series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("series is empty")]
    Empty,

    #[error("timestamps not strictly increasing at index {index}")]
    NonIncreasingTimestamps { index: usize },

    #[error("malformed bar at index {index}: {reason}")]
    MalformedBar { index: usize, reason: String },

    #[error("bar/signal length mismatch: {bars} bars vs {signals} signals")]
    LengthMismatch { bars: usize, signals: usize },

    #[error("signal misaligned at index {index}: bar {bar}, signal {signal}")]
    Misaligned {
        index: usize,
        bar: NaiveDate,
        signal: NaiveDate,
    },

    #[error("signal strength {value} at index {index} outside [-1, 1]")]
    StrengthOutOfRange { index: usize, value: f64 },

    #[error("instrument '{instrument}' does not share the universe timeline")]
    UnalignedUniverse { instrument: String },

    #[error("instrument '{0}' appears more than once")]
    DuplicateInstrument(String),

    #[error("initial capital must be > 0, got {0}")]
    NonPositiveCapital(f64),
}

/// Out-of-range configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range: expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn out_of_range(field: &'static str, value: f64, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value,
            expected,
        }
    }
}

/// A broken accounting or bookkeeping invariant. Never recovered from.
#[derive(Debug, Clone, Error)]
#[error("simulation invariant violated at {timestamp}: {message}")]
pub struct SimulationInvariantError {
    pub timestamp: NaiveDate,
    pub message: String,
    /// Portfolio snapshot at the failing bar.
    pub state: Box<PortfolioState>,
}

/// Any fatal engine error.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    SimulationInvariant(#[from] SimulationInvariantError),
}
