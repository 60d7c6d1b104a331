//! Backtest runner: wires together providers, signal generation, the engine
//! and the performance analyzer.
//!
//! Two entry points:
//! - `run_job()`: fetches bars from a provider, then runs. Used by the CLI and batches.
//! - `run_with_series()`: takes pre-fetched series. No I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::data::{dataset_hash, BarSeriesProvider, DataError};
use edgelab_core::domain::{BarSeries, EquityPoint, SignalSeries, Trade};
use edgelab_core::engine::{run_universe, InstrumentFeed, Universe};
use edgelab_core::signals::StrategyConfig;
use edgelab_core::EngineError;

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::{analyze, Metrics};

/// Errors from one backtest run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy error: {0}")]
    Strategy(#[from] edgelab_core::ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl From<edgelab_core::InputError> for RunError {
    fn from(err: edgelab_core::InputError) -> Self {
        RunError::Engine(err.into())
    }
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// One backtest to run: a strategy applied to a config's universe and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestJob {
    pub name: String,
    pub strategy: StrategyConfig,
    pub config: BacktestConfig,
}

impl BacktestJob {
    /// The config's own strategy.
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::with_strategy(config, config.strategy.clone())
    }

    /// Same universe and limits, different strategy.
    pub fn with_strategy(config: &BacktestConfig, strategy: StrategyConfig) -> Self {
        let name = match &strategy {
            StrategyConfig::Composite { components, .. } => format!("composite({})", components.len()),
            other => other.kind().to_string(),
        };
        Self {
            name,
            strategy,
            config: config.clone(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// One job per comparison strategy of `config`.
    pub fn comparison(config: &BacktestConfig) -> Vec<Self> {
        config
            .comparison_strategies()
            .into_iter()
            .map(|s| Self::with_strategy(config, s))
            .collect()
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub strategy: StrategyConfig,
    /// Generator label including parameters.
    pub strategy_label: String,
    pub instruments: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_capital: f64,
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub benchmark: String,
    pub benchmark_curve: Vec<EquityPoint>,
    pub halted: bool,
    pub bar_count: usize,
    pub dataset_hash: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Validate and fetch bars for `job`, then run it.
pub fn run_job<P>(job: &BacktestJob, provider: &P) -> Result<RunReport, RunError>
where
    P: BarSeriesProvider + ?Sized,
{
    job.config.validate()?;
    let bt = &job.config.backtest;
    tracing::info!(job = %job.name, instruments = bt.instruments.len(), provider = provider.name(), "run start");

    let series = bt
        .instruments
        .iter()
        .map(|instrument| provider.fetch(instrument, bt.start, bt.end))
        .collect::<Result<Vec<_>, _>>()?;

    let external_benchmark = match job.config.benchmark_instrument() {
        Some(name) if !series.iter().any(|s| s.instrument() == name) => Some(provider.fetch(name, bt.start, bt.end)?),
        _ => None,
    };

    run_validated(job, &series, external_benchmark.as_ref())
}

/// Run `job` on pre-fetched series. `benchmark` overrides the benchmark
/// instrument lookup among `series`.
pub fn run_with_series(
    job: &BacktestJob,
    series: &[BarSeries],
    benchmark: Option<&BarSeries>,
) -> Result<RunReport, RunError> {
    job.config.validate()?;
    run_validated(job, series, benchmark)
}

fn run_validated(job: &BacktestJob, series: &[BarSeries], benchmark: Option<&BarSeries>) -> Result<RunReport, RunError> {
    let config = &job.config;
    let generator = job.strategy.build()?;

    let signals: Vec<SignalSeries> = series.iter().map(|s| generator.generate(s)).collect();
    let feeds = series
        .iter()
        .zip(&signals)
        .map(|(bars, sigs)| InstrumentFeed::new(bars, sigs))
        .collect();
    let universe = Universe::new(feeds)?;

    let engine_config = config.engine_config();
    tracing::debug!(
        job = %job.name,
        groups = engine_config.correlation.groups().len(),
        detect = engine_config.correlation_detection.is_some(),
        "correlation groups"
    );
    let result = run_universe(&universe, &engine_config)?;

    let benchmark_series = benchmark.or_else(|| {
        let name = config.benchmark_instrument()?;
        series.iter().find(|s| s.instrument() == name)
    });
    let benchmark_curve = benchmark_series
        .map(|s| buy_and_hold(s, engine_config.initial_capital))
        .unwrap_or_default();
    let metrics = analyze(
        &result.equity_curve,
        &result.trades,
        (!benchmark_curve.is_empty()).then_some(benchmark_curve.as_slice()),
    );

    tracing::info!(
        job = %job.name,
        trades = result.trades.len(),
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        halted = result.halted(),
        "run done"
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        name: job.name.clone(),
        strategy: job.strategy.clone(),
        strategy_label: generator.name().to_string(),
        instruments: result.instruments.clone(),
        start: config.backtest.start,
        end: config.backtest.end,
        initial_capital: engine_config.initial_capital,
        halted: result.halted(),
        bar_count: universe.len(),
        dataset_hash: dataset_hash(series),
        benchmark: benchmark_series.map(|s| s.instrument().to_string()).unwrap_or_default(),
        benchmark_curve,
        metrics,
        trades: result.trades,
        equity_curve: result.equity_curve,
    })
}

/// Buy-and-hold equity: `capital * close_t / close_0`.
pub fn buy_and_hold(series: &BarSeries, capital: f64) -> Vec<EquityPoint> {
    let first = series.first().close;
    if first <= 0.0 {
        return Vec::new();
    }
    series
        .bars()
        .iter()
        .map(|bar| EquityPoint {
            timestamp: bar.timestamp,
            equity: capital * bar.close / first,
        })
        .collect()
}
