//! TOML backtest configuration.
//!
//! One file describes a complete run: capital and date range, the instrument
//! universe, risk limits and sizing, the strategy (plus optional comparison
//! strategies), correlated groups and the bar source. Everything is validated
//! before any run begins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::data::{
    BarSeriesProvider, CachedProvider, CsvProvider, SyntheticProvider, DEFAULT_MAX_GAP_DAYS,
};
use edgelab_core::engine::{EngineConfig, TradingMode};
use edgelab_core::risk::{CorrelationDetection, CorrelationGroups, RiskLimits, SizingConfig, SizingMethod};
use edgelab_core::signals::StrategyConfig;

/// Errors loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Invalid(#[from] edgelab_core::ConfigError),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(edgelab_core::ConfigError::Invalid(message.into()))
}

/// Complete backtest configuration (one TOML file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub risk: RiskSection,
    pub strategy: StrategyConfig,
    /// Extra strategies for `compare`. Empty means every default strategy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare: Vec<StrategyConfig>,
    #[serde(default)]
    pub correlation: CorrelationSection,
    #[serde(default)]
    pub data: DataSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub instruments: Vec<String>,
    #[serde(default)]
    pub trading_mode: TradingMode,
    /// Instrument whose buy-and-hold curve is the benchmark. Defaults to the
    /// first instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebalance_threshold: Option<f64>,
    /// Fixed fee per fill.
    #[serde(default)]
    pub commission: f64,
}

fn default_capital() -> f64 {
    100_000.0
}

/// `[risk]`: the limits plus sizing selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSection {
    #[serde(flatten)]
    pub limits: RiskLimits,
    #[serde(default)]
    pub sizing_method: SizingMethod,
    #[serde(default = "default_vol_lookback")]
    pub vol_lookback: usize,
    #[serde(default = "default_kelly_lookback")]
    pub kelly_lookback: usize,
}

fn default_vol_lookback() -> usize {
    SizingConfig::default().vol_lookback
}

fn default_kelly_lookback() -> usize {
    SizingConfig::default().kelly_lookback
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
            sizing_method: SizingMethod::default(),
            vol_lookback: default_vol_lookback(),
            kelly_lookback: default_kelly_lookback(),
        }
    }
}

impl RiskSection {
    pub fn sizing(&self) -> SizingConfig {
        SizingConfig {
            method: self.sizing_method,
            vol_lookback: self.vol_lookback,
            kelly_lookback: self.kelly_lookback,
        }
    }
}

/// `[correlation]`: hand-flagged groups, optionally extended by pairs the
/// engine detects bar by bar from the returns seen so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupConfig>,
    /// Flag every pair whose return correlation reaches this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_threshold: Option<f64>,
    /// Trailing returns used for detection. All seen so far by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub members: Vec<String>,
}

impl CorrelationSection {
    /// The hand-flagged groups.
    pub fn fixed_groups(&self) -> CorrelationGroups {
        let mut groups = CorrelationGroups::new();
        for group in &self.groups {
            groups.add_group(group.members.iter().cloned());
        }
        groups
    }

    /// Run-time detection, when a threshold is set.
    pub fn detection(&self) -> Option<CorrelationDetection> {
        self.detect_threshold.map(|threshold| CorrelationDetection {
            threshold,
            lookback: self.lookback,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Csv,
    #[default]
    Synthetic,
}

/// `[data]`: where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default)]
    pub source: DataSource,
    /// Directory of `<INSTRUMENT>.csv` files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_dir: Option<PathBuf>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_gap")]
    pub max_gap_days: i64,
}

fn default_cache_ttl() -> u64 {
    3_600
}

fn default_max_gap() -> i64 {
    DEFAULT_MAX_GAP_DAYS
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSource::Synthetic,
            csv_dir: None,
            seed: 0,
            cache_ttl_secs: default_cache_ttl(),
            max_gap_days: default_max_gap(),
        }
    }
}

impl DataSection {
    /// Cached provider for the configured source.
    pub fn provider(&self) -> Result<CachedProvider<Box<dyn BarSeriesProvider>>, ConfigError> {
        let inner: Box<dyn BarSeriesProvider> = match self.source {
            DataSource::Synthetic => Box::new(SyntheticProvider::new(self.seed)),
            DataSource::Csv => {
                let dir = self
                    .csv_dir
                    .as_ref()
                    .ok_or_else(|| invalid("data.csv_dir is required when data.source = \"csv\""))?;
                Box::new(CsvProvider::new(dir.clone()).with_max_gap_days(self.max_gap_days))
            }
        };
        Ok(CachedProvider::new(inner, Duration::from_secs(self.cache_ttl_secs)))
    }
}

impl BacktestConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject every out-of-range or inconsistent field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(edgelab_core::ConfigError::out_of_range("initial_capital", bt.initial_capital, "> 0").into());
        }
        if bt.start >= bt.end {
            return Err(invalid(format!("backtest.start {} must be before backtest.end {}", bt.start, bt.end)));
        }
        if bt.instruments.is_empty() {
            return Err(invalid("backtest.instruments must not be empty"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for instrument in &bt.instruments {
            if instrument.trim().is_empty() {
                return Err(invalid("backtest.instruments contains an empty name"));
            }
            if !seen.insert(instrument.as_str()) {
                return Err(invalid(format!("instrument '{instrument}' is listed twice")));
            }
        }
        if let Some(threshold) = bt.rebalance_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(edgelab_core::ConfigError::out_of_range("rebalance_threshold", threshold, "> 0").into());
            }
        }
        if !(bt.commission.is_finite() && bt.commission >= 0.0) {
            return Err(edgelab_core::ConfigError::out_of_range("commission", bt.commission, ">= 0").into());
        }

        self.risk.limits.validate()?;
        self.risk.sizing().validate()?;
        self.strategy.validate()?;
        for strategy in &self.compare {
            strategy.validate()?;
        }

        if let Some(detection) = self.correlation.detection() {
            detection.validate()?;
        }
        for group in &self.correlation.groups {
            if group.members.len() < 2 {
                return Err(invalid("correlation groups need at least two members"));
            }
        }

        if self.data.source == DataSource::Csv && self.data.csv_dir.is_none() {
            return Err(invalid("data.csv_dir is required when data.source = \"csv\""));
        }
        if self.data.max_gap_days < 1 {
            return Err(edgelab_core::ConfigError::out_of_range(
                "data.max_gap_days",
                self.data.max_gap_days as f64,
                ">= 1",
            )
            .into());
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.backtest.initial_capital)
            .with_limits(self.risk.limits)
            .with_sizing(self.risk.sizing())
            .with_trading_mode(self.backtest.trading_mode)
            .with_correlation(self.correlation.fixed_groups())
            .with_commission(self.backtest.commission);
        config.rebalance_threshold = self.backtest.rebalance_threshold;
        config.correlation_detection = self.correlation.detection();
        config
    }

    /// Benchmark instrument: explicit, else the first traded instrument.
    /// `None` only for a config with no instruments, which `validate` rejects.
    pub fn benchmark_instrument(&self) -> Option<&str> {
        self.backtest
            .benchmark
            .as_deref()
            .or_else(|| self.backtest.instruments.first().map(String::as_str))
    }

    /// Strategies for `compare`: the configured list, else every default.
    pub fn comparison_strategies(&self) -> Vec<StrategyConfig> {
        if !self.compare.is_empty() {
            return self.compare.clone();
        }
        vec![
            StrategyConfig::sma_crossover(),
            StrategyConfig::rsi(),
            StrategyConfig::macd(),
            StrategyConfig::bollinger(),
            StrategyConfig::momentum(),
            StrategyConfig::Composite {
                aggregation: Default::default(),
                components: vec![
                    StrategyConfig::sma_crossover(),
                    StrategyConfig::rsi(),
                    StrategyConfig::macd(),
                    StrategyConfig::bollinger(),
                    StrategyConfig::momentum(),
                ],
            },
        ]
    }
}

/// Starter config written by `edgelab init-config`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# edgelab backtest configuration

[backtest]
initial_capital = 100000.0
start = "2022-01-03"
end = "2023-12-29"
instruments = ["SPY", "QQQ"]
trading_mode = "LONG_ONLY"      # or "LONG_SHORT"
# benchmark = "SPY"             # defaults to the first instrument
# rebalance_threshold = 0.25    # resize same-direction positions beyond 25%
commission = 1.0                # fixed fee per fill

[risk]
max_position_size_fraction = 0.2
stop_loss_pct = 0.02
take_profit_pct = 0.05
# trailing_stop_pct = 0.05      # exit on a 5% give-back from the best close
max_drawdown_pct = 0.20
max_correlated_exposure_fraction = 0.7
sizing_method = "VOL_SCALED"    # or "KELLY"
vol_lookback = 20
kelly_lookback = 60

[strategy]
type = "SMA_CROSSOVER"
short_window = 50
long_window = 200

# Strategies for `edgelab compare`; all defaults when omitted.
# [[compare]]
# type = "RSI"
# period = 14
# oversold = 30.0
# overbought = 70.0

[correlation]
# detect_threshold = 0.8        # also flag pairs whose returns so far correlate this much
# lookback = 60

[[correlation.groups]]
members = ["SPY", "QQQ"]

[data]
source = "synthetic"            # or "csv"
# csv_dir = "data"
seed = 42
cache_ttl_secs = 3600
max_gap_days = 5
"#;
