//! CSV provider: one `<INSTRUMENT>.csv` file per instrument.
//!
//! Expected header: `date,open,high,low,close,volume`. Extra columns (for
//! example `adj_close`) are ignored. Rows may appear in any order.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::provider::{check_coverage, BarSeriesProvider, DataError, DEFAULT_MAX_GAP_DAYS};
use crate::domain::{Bar, BarSeries};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "timestamp")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume", default)]
    volume: f64,
}

impl From<CsvRow> for Bar {
    fn from(row: CsvRow) -> Self {
        Bar::new(
            row.date,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume.max(0.0) as u64,
        )
    }
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
    max_gap_days: i64,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
        }
    }

    pub fn with_max_gap_days(mut self, days: i64) -> Self {
        self.max_gap_days = days;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{instrument}.csv"))
    }

    /// Read the whole file for `instrument`, sorted by date.
    pub fn load(&self, instrument: &str) -> Result<BarSeries, DataError> {
        let path = self.path_for(instrument);
        if !path.exists() {
            return Err(DataError::NotFound {
                instrument: instrument.to_string(),
            });
        }
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| csv_error(&path, e))?;

        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| csv_error(&path, e))?;
            bars.push(Bar::from(row));
        }
        bars.sort_by_key(|b| b.timestamp);

        BarSeries::new(instrument, bars).map_err(|source| DataError::Input {
            instrument: instrument.to_string(),
            source,
        })
    }
}

fn csv_error(path: &Path, err: csv::Error) -> DataError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return DataError::Io {
                path: path.to_path_buf(),
                source,
            };
        }
        return DataError::Parse {
            path: path.to_path_buf(),
            message: "I/O error".into(),
        };
    }
    DataError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl BarSeriesProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        let series = self.load(instrument)?;
        check_coverage(&series, start, end, self.max_gap_days)
    }
}
