//! EdgeLab CLI: run and compare backtests from a TOML config.
//!
//! Commands:
//! - `run`: one backtest with the config's strategy; prints the summary and saves artifacts
//! - `compare`: every comparison strategy on the same universe, ranked by Sharpe
//! - `init-config`: write a commented starter config

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use edgelab_runner::{
    comparison_table, run_batch, run_job, save_artifacts, save_comparison, summary, BacktestConfig, BacktestJob,
    BatchOptions, DEFAULT_CONFIG_TEMPLATE,
};

#[derive(Parser)]
#[command(name = "edgelab", version, about = "EdgeLab: multi-instrument strategy backtesting")]
struct Cli {
    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest with the config's strategy.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output: PathBuf,
    },
    /// Run every comparison strategy over the same universe and rank them.
    Compare {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for the comparison table.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Run strategies one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Worker threads for parallel runs. Defaults to one per core.
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Write a commented starter config.
    InitConfig {
        /// Where to write the config.
        #[arg(long, default_value = "edgelab.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Run { config, output } => run_cmd(&config, &output),
        Commands::Compare {
            config,
            output,
            sequential,
            threads,
        } => compare_cmd(&config, &output, sequential, threads),
        Commands::InitConfig { path, force } => init_config_cmd(&path, force),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid --log-level '{level}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run_cmd(config_path: &Path, output: &Path) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)?;
    tracing::info!(config = %config_path.display(), strategy = config.strategy.kind(), "config loaded");
    let provider = config.data.provider()?;
    let job = BacktestJob::from_config(&config);

    let report = run_job(&job, &provider)?;
    print!("{}", summary(&report));

    let run_dir = save_artifacts(&report, output)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn compare_cmd(config_path: &Path, output: &Path, sequential: bool, threads: Option<usize>) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)?;
    let provider = config.data.provider()?;
    let jobs = BacktestJob::comparison(&config);
    tracing::info!(config = %config_path.display(), strategies = jobs.len(), "config loaded");

    let mut options = if sequential {
        BatchOptions::sequential()
    } else {
        BatchOptions::default()
    };
    if let Some(n) = threads {
        if n == 0 {
            bail!("--threads must be at least 1");
        }
        options = options.with_max_threads(n);
    }

    let cancel = AtomicBool::new(false);
    let batch = run_batch(&jobs, &provider, options, Some(&cancel));

    for (name, err) in batch.failed() {
        eprintln!("{name}: {err}");
    }
    let rows = batch.comparison();
    if rows.is_empty() {
        bail!("no strategy completed");
    }

    print!("{}", comparison_table(&rows));
    save_comparison(&rows, output)?;
    println!("Comparison saved to: {}", output.display());
    Ok(())
}

fn init_config_cmd(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
