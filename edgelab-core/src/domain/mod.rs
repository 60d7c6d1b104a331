//! Domain types for edgelab

pub mod bar;
pub mod portfolio;
pub mod position;
pub mod series;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use portfolio::{EquityPoint, Marks, PortfolioState};
pub use position::Position;
pub use series::{BarSeries, SignalSeries};
pub use signal::{Direction, Signal};
pub use trade::{ExitReason, Trade};

/// Instrument identifier (ticker symbol).
pub type Instrument = String;
