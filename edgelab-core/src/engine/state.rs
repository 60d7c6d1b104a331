//! Engine configuration and run result types.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, PortfolioState, Trade};
use crate::error::{ConfigError, EngineError, InputError};
use crate::risk::{CorrelationDetection, CorrelationGroups, RiskLimits, RiskManager, SizingConfig};

/// Which sides the engine may trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    /// SHORT signals are treated as FLAT.
    #[default]
    LongOnly,
    LongShort,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub limits: RiskLimits,
    pub sizing: SizingConfig,
    pub trading_mode: TradingMode,
    /// Relative size change that triggers a same-direction resize. `None` holds.
    pub rebalance_threshold: Option<f64>,
    /// Correlated instrument groups for the diversification check.
    pub correlation: CorrelationGroups,
    /// Pairs detected bar by bar from the history seen so far, added to `correlation`.
    #[serde(default)]
    pub correlation_detection: Option<CorrelationDetection>,
    /// Fixed fee charged on every fill.
    #[serde(default)]
    pub commission: f64,
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            limits: RiskLimits::default(),
            sizing: SizingConfig::default(),
            trading_mode: TradingMode::LongOnly,
            rebalance_threshold: None,
            correlation: CorrelationGroups::default(),
            correlation_detection: None,
            commission: 0.0,
        }
    }

    pub fn with_limits(mut self, limits: RiskLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingConfig) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_trading_mode(mut self, mode: TradingMode) -> Self {
        self.trading_mode = mode;
        self
    }

    pub fn with_rebalance_threshold(mut self, threshold: f64) -> Self {
        self.rebalance_threshold = Some(threshold);
        self
    }

    pub fn with_correlation(mut self, correlation: CorrelationGroups) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_correlation_detection(mut self, detection: CorrelationDetection) -> Self {
        self.correlation_detection = Some(detection);
        self
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(InputError::NonPositiveCapital(self.initial_capital).into());
        }
        self.limits.validate()?;
        self.sizing.validate()?;
        if let Some(threshold) = self.rebalance_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ConfigError::out_of_range("rebalance_threshold", threshold, "> 0").into());
            }
        }
        if let Some(detection) = &self.correlation_detection {
            detection.validate()?;
        }
        if !(self.commission.is_finite() && self.commission >= 0.0) {
            return Err(ConfigError::out_of_range("commission", self.commission, ">= 0").into());
        }
        Ok(())
    }

    /// Risk Manager for this configuration.
    pub fn risk_manager(&self) -> Result<RiskManager, ConfigError> {
        Ok(RiskManager::new(self.limits, &self.sizing)?
            .with_correlation(self.correlation.clone())
            .with_detection(self.correlation_detection)
            .with_commission(self.commission)
            .with_rebalance_threshold(self.rebalance_threshold))
    }
}

/// Output of one backtest run. Read-only for downstream reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub instruments: Vec<String>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_state: PortfolioState,
}

impl RunResult {
    pub fn initial_capital(&self) -> f64 {
        self.final_state.initial_capital
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.final_state.initial_capital, |p| p.equity)
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    /// Whether the drawdown limit stopped trading during the run.
    pub fn halted(&self) -> bool {
        self.final_state.trading_halted
    }
}
