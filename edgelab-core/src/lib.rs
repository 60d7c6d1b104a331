//! edgelab core: domain types, bar providers, signals, the Risk Manager and
//! the backtest engine.
//!
//! This crate contains the simulation itself:
//! - Domain types (bars, signals, positions, trades, portfolio state)
//! - Bar-series providers with range coverage checks and a TTL cache
//! - Indicators and the six strategy signal generators
//! - Risk Manager: Kelly / volatility-scaled sizing, stop loss, take profit,
//!   drawdown halt, correlated exposure cap
//! - Bar-by-bar engine over one or more aligned instruments

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod risk;
pub mod signals;

pub use error::{ConfigError, EngineError, InputError, SimulationInvariantError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a batch worker touches is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::SignalSeries>();
        require_sync::<domain::SignalSeries>();
        require_send::<domain::PortfolioState>();
        require_sync::<domain::PortfolioState>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        // Engine and risk
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<risk::RiskManager>();
        require_sync::<risk::RiskManager>();
        require_send::<Box<dyn signals::SignalGenerator>>();
        require_sync::<Box<dyn signals::SignalGenerator>>();

        // Providers
        require_send::<data::CachedProvider<data::CsvProvider>>();
        require_sync::<data::CachedProvider<data::SyntheticProvider>>();
        require_send::<Box<dyn data::BarSeriesProvider>>();
        require_sync::<Box<dyn data::BarSeriesProvider>>();

        // Errors
        require_send::<EngineError>();
        require_sync::<EngineError>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
    }
}
