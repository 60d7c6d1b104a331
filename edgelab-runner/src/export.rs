//! Export: JSON, CSV and plain-text artifacts for finished runs.
//!
//! - **JSON**: full report with schema versioning
//! - **CSV**: trade log and equity curve (with benchmark) for external tools
//! - **Text**: the human-readable summary from `report`
//!
//! Persisted JSON carries `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use edgelab_core::domain::{EquityPoint, Trade};

use crate::batch::ComparisonRow;
use crate::report::{comparison_table, summary};
use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport = serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: instrument, side, entry_date, entry_price, exit_date, exit_price,
/// quantity, pnl, fees, return_pct, exit_reason, bars_held
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "instrument",
        "side",
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "quantity",
        "pnl",
        "fees",
        "return_pct",
        "exit_reason",
        "bars_held",
    ])?;

    for t in trades {
        let side = if t.quantity >= 0.0 { "LONG" } else { "SHORT" };
        wtr.write_record([
            t.instrument.clone(),
            side.to_string(),
            t.entry_timestamp.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_timestamp.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{}", t.quantity),
            format!("{:.2}", t.pnl),
            format!("{:.2}", t.fees),
            format!("{:.6}", t.return_pct()),
            t.exit_reason.to_string(),
            t.bars_held.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, equity, drawdown, benchmark. The benchmark column is empty
/// on dates the benchmark curve does not cover.
pub fn export_equity_csv(equity_curve: &[EquityPoint], benchmark: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity", "drawdown", "benchmark"])?;

    let mut peak = f64::NEG_INFINITY;
    for point in equity_curve {
        peak = peak.max(point.equity);
        let drawdown = if peak > 0.0 { (peak - point.equity) / peak } else { 0.0 };
        let bench = benchmark
            .binary_search_by(|b| b.timestamp.cmp(&point.timestamp))
            .ok()
            .map(|i| format!("{:.2}", benchmark[i].equity))
            .unwrap_or_default();
        wtr.write_record([
            point.timestamp.to_string(),
            format!("{:.2}", point.equity),
            format!("{drawdown:.6}"),
            bench,
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_comparison_csv(rows: &[ComparisonRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{name}_{start}_{end}/` under `output_dir` containing:
/// - `report.json`: the full `RunReport`
/// - `trades.csv`: trade log
/// - `equity.csv`: equity curve with drawdown and benchmark
/// - `summary.txt`: plain-text summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}_{}", sanitize(&report.name), report.start, report.end);
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write(&run_dir.join("report.json"), &export_json(report)?)?;
    write(&run_dir.join("trades.csv"), &export_trades_csv(&report.trades)?)?;
    write(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&report.equity_curve, &report.benchmark_curve)?,
    )?;
    write(&run_dir.join("summary.txt"), &summary(report))?;

    tracing::debug!(dir = %run_dir.display(), "artifacts written");
    Ok(run_dir)
}

/// Save a comparison as `comparison.csv` and `comparison.txt` under `output_dir`.
pub fn save_comparison(rows: &[ComparisonRow], output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    write(&output_dir.join("comparison.csv"), &export_comparison_csv(rows)?)?;
    write(&output_dir.join("comparison.txt"), &comparison_table(rows))?;
    Ok(())
}

/// Load a `RunReport` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
