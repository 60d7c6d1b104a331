//! EdgeLab Runner: backtest orchestration, strategy comparison, metrics, export.
//!
//! This crate builds on `edgelab-core` to provide:
//! - TOML configuration with validation and a commented template
//! - Single-backtest runner (fetch, signals, engine, analysis)
//! - Batch runs across strategies, in parallel and cancellable
//! - Performance metrics with explicit sentinels
//! - JSON/CSV/text artifacts

pub mod batch;
pub mod config;
pub mod export;
pub mod metrics;
pub mod report;
pub mod runner;

pub use batch::{run_batch, BatchOptions, BatchResult, ComparisonRow, JobOutcome, JobResult};
pub use config::{BacktestConfig, ConfigError, DataSource, DEFAULT_CONFIG_TEMPLATE};
pub use export::{load_artifacts, save_artifacts, save_comparison};
pub use metrics::{analyze, MarketComparison, Metrics, ProfitFactor, TradeStats};
pub use report::{comparison_table, summary};
pub use runner::{run_job, run_with_series, BacktestJob, RunError, RunReport, SCHEMA_VERSION};
