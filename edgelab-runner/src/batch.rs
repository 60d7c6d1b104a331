//! Batch runner: many isolated backtests, optionally in parallel.
//!
//! Each job owns its own portfolio state; only the provider (read-only,
//! internally synchronized cache) is shared. The cancel flag is checked
//! before each job starts, never mid-run. Jobs that never started come back
//! as `Cancelled`, and one job's failure never stops its siblings.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use edgelab_core::data::BarSeriesProvider;

use crate::runner::{run_job, BacktestJob, RunError, RunReport};

/// How to execute a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub parallel: bool,
    /// Worker threads when parallel. `None` uses rayon's default.
    pub max_threads: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_threads: None,
        }
    }
}

impl BatchOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            max_threads: None,
        }
    }

    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = Some(threads);
        self
    }
}

/// What happened to one job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(Box<RunReport>),
    Failed(RunError),
    Cancelled,
}

#[derive(Debug)]
pub struct JobResult {
    pub name: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn report(&self) -> Option<&RunReport> {
        match &self.outcome {
            JobOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RunError> {
        match &self.outcome {
            JobOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, JobOutcome::Cancelled)
    }
}

/// One row of a strategy comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    pub strategy: String,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
    pub trade_count: usize,
}

/// Results of a batch, in job order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub results: Vec<JobResult>,
}

impl BatchResult {
    pub fn completed(&self) -> impl Iterator<Item = &RunReport> {
        self.results.iter().filter_map(JobResult::report)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &RunError)> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.name.as_str(), e)))
    }

    pub fn cancelled_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_cancelled()).count()
    }

    /// Completed runs ranked by Sharpe, best first. Ties keep job order.
    pub fn comparison(&self) -> Vec<ComparisonRow> {
        let mut rows: Vec<ComparisonRow> = self
            .completed()
            .map(|r| ComparisonRow {
                name: r.name.clone(),
                strategy: r.strategy_label.clone(),
                total_return: r.metrics.total_return,
                annualized_return: r.metrics.annualized_return,
                sharpe: r.metrics.sharpe,
                max_drawdown: r.metrics.max_drawdown,
                win_rate: r.metrics.trades.win_rate(),
                trade_count: r.metrics.trades.trade_count(),
            })
            .collect();
        rows.sort_by(|a, b| b.sharpe.total_cmp(&a.sharpe));
        rows
    }
}

/// Run every job against `provider`.
pub fn run_batch<P>(
    jobs: &[BacktestJob],
    provider: &P,
    options: BatchOptions,
    cancel: Option<&AtomicBool>,
) -> BatchResult
where
    P: BarSeriesProvider + ?Sized,
{
    tracing::info!(jobs = jobs.len(), parallel = options.parallel, "batch start");

    let run_one = |job: &BacktestJob| -> JobResult {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return JobResult {
                name: job.name.clone(),
                outcome: JobOutcome::Cancelled,
            };
        }
        let outcome = match run_job(job, provider) {
            Ok(report) => JobOutcome::Completed(Box::new(report)),
            Err(err) => {
                tracing::warn!(job = %job.name, error = %err, "run failed");
                JobOutcome::Failed(err)
            }
        };
        JobResult {
            name: job.name.clone(),
            outcome,
        }
    };

    let results: Vec<JobResult> = if options.parallel {
        match build_pool(options.max_threads) {
            Some(pool) => pool.install(|| jobs.par_iter().map(run_one).collect()),
            None => jobs.par_iter().map(run_one).collect(),
        }
    } else {
        jobs.iter().map(run_one).collect()
    };

    let batch = BatchResult { results };
    let cancelled = batch.cancelled_count();
    if cancelled > 0 {
        tracing::warn!(cancelled, "batch cancelled before all jobs started");
    }
    tracing::info!(
        completed = batch.completed().count(),
        failed = batch.failed().count(),
        cancelled,
        "batch done"
    );
    batch
}

fn build_pool(max_threads: Option<usize>) -> Option<rayon::ThreadPool> {
    let threads = max_threads?;
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to the global rayon pool");
            None
        }
    }
}
