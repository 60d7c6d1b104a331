//! Serializable strategy selection.
//!
//! `StrategyConfig` is the `type`-tagged form strategies take in config
//! files. `validate` rejects bad parameters before any run starts and
//! `build` turns a validated config into a generator.

use serde::{Deserialize, Serialize};

use super::{
    Aggregation, BollingerReversion, Composite, MacdCrossover, Momentum, RsiReversion, SignalGenerator,
    SmaCrossover,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    SmaCrossover {
        #[serde(default = "defaults::short_window")]
        short_window: usize,
        #[serde(default = "defaults::long_window")]
        long_window: usize,
    },
    Rsi {
        #[serde(default = "defaults::rsi_period")]
        period: usize,
        #[serde(default = "defaults::oversold")]
        oversold: f64,
        #[serde(default = "defaults::overbought")]
        overbought: f64,
    },
    Macd {
        #[serde(default = "defaults::fast")]
        fast: usize,
        #[serde(default = "defaults::slow")]
        slow: usize,
        #[serde(default = "defaults::signal")]
        signal: usize,
    },
    Bollinger {
        #[serde(default = "defaults::bollinger_period")]
        period: usize,
        #[serde(default = "defaults::num_std")]
        num_std: f64,
    },
    Momentum {
        #[serde(default = "defaults::momentum_lookback")]
        lookback: usize,
        #[serde(default = "defaults::momentum_threshold")]
        threshold: f64,
    },
    Composite {
        #[serde(default)]
        aggregation: Aggregation,
        components: Vec<StrategyConfig>,
    },
}

mod defaults {
    pub fn short_window() -> usize {
        50
    }
    pub fn long_window() -> usize {
        200
    }
    pub fn rsi_period() -> usize {
        14
    }
    pub fn oversold() -> f64 {
        30.0
    }
    pub fn overbought() -> f64 {
        70.0
    }
    pub fn fast() -> usize {
        12
    }
    pub fn slow() -> usize {
        26
    }
    pub fn signal() -> usize {
        9
    }
    pub fn bollinger_period() -> usize {
        20
    }
    pub fn num_std() -> f64 {
        2.0
    }
    pub fn momentum_lookback() -> usize {
        20
    }
    pub fn momentum_threshold() -> f64 {
        0.02
    }
}

impl StrategyConfig {
    pub fn sma_crossover() -> Self {
        Self::SmaCrossover {
            short_window: defaults::short_window(),
            long_window: defaults::long_window(),
        }
    }

    pub fn rsi() -> Self {
        Self::Rsi {
            period: defaults::rsi_period(),
            oversold: defaults::oversold(),
            overbought: defaults::overbought(),
        }
    }

    pub fn macd() -> Self {
        Self::Macd {
            fast: defaults::fast(),
            slow: defaults::slow(),
            signal: defaults::signal(),
        }
    }

    pub fn bollinger() -> Self {
        Self::Bollinger {
            period: defaults::bollinger_period(),
            num_std: defaults::num_std(),
        }
    }

    pub fn momentum() -> Self {
        Self::Momentum {
            lookback: defaults::momentum_lookback(),
            threshold: defaults::momentum_threshold(),
        }
    }

    /// Variant tag as it appears in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SmaCrossover { .. } => "SMA_CROSSOVER",
            Self::Rsi { .. } => "RSI",
            Self::Macd { .. } => "MACD",
            Self::Bollinger { .. } => "BOLLINGER",
            Self::Momentum { .. } => "MOMENTUM",
            Self::Composite { .. } => "COMPOSITE",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::SmaCrossover {
                short_window,
                long_window,
            } => {
                positive("sma_crossover.short_window", *short_window)?;
                positive("sma_crossover.long_window", *long_window)?;
                if short_window >= long_window {
                    return Err(ConfigError::Invalid(format!(
                        "sma_crossover.short_window ({short_window}) must be below long_window ({long_window})"
                    )));
                }
            }
            Self::Rsi {
                period,
                oversold,
                overbought,
            } => {
                positive("rsi.period", *period)?;
                in_range("rsi.oversold", *oversold, 0.0, 100.0)?;
                in_range("rsi.overbought", *overbought, 0.0, 100.0)?;
                if oversold >= overbought {
                    return Err(ConfigError::Invalid(format!(
                        "rsi.oversold ({oversold}) must be below overbought ({overbought})"
                    )));
                }
            }
            Self::Macd { fast, slow, signal } => {
                positive("macd.fast", *fast)?;
                positive("macd.slow", *slow)?;
                positive("macd.signal", *signal)?;
                if fast >= slow {
                    return Err(ConfigError::Invalid(format!(
                        "macd.fast ({fast}) must be below slow ({slow})"
                    )));
                }
            }
            Self::Bollinger { period, num_std } => {
                if *period < 2 {
                    return Err(ConfigError::out_of_range("bollinger.period", *period as f64, ">= 2"));
                }
                if !(num_std.is_finite() && *num_std > 0.0) {
                    return Err(ConfigError::out_of_range("bollinger.num_std", *num_std, "> 0"));
                }
            }
            Self::Momentum { lookback, threshold } => {
                positive("momentum.lookback", *lookback)?;
                if !(threshold.is_finite() && *threshold >= 0.0) {
                    return Err(ConfigError::out_of_range("momentum.threshold", *threshold, ">= 0"));
                }
            }
            Self::Composite {
                aggregation,
                components,
            } => {
                if components.is_empty() {
                    return Err(ConfigError::Invalid("composite needs at least one component".into()));
                }
                for c in components {
                    c.validate()?;
                }
                if let Aggregation::WeightedSum { weights, threshold } = aggregation {
                    if !weights.is_empty() && weights.len() != components.len() {
                        return Err(ConfigError::Invalid(format!(
                            "composite has {} components but {} weights",
                            components.len(),
                            weights.len()
                        )));
                    }
                    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(ConfigError::Invalid("composite weights must be finite and >= 0".into()));
                    }
                    in_range("composite.threshold", *threshold, 0.0, 1.0)?;
                }
            }
        }
        Ok(())
    }

    /// Validate, then construct the generator.
    pub fn build(&self) -> Result<Box<dyn SignalGenerator>, ConfigError> {
        self.validate()?;
        Ok(self.build_unchecked())
    }

    fn build_unchecked(&self) -> Box<dyn SignalGenerator> {
        match self {
            Self::SmaCrossover {
                short_window,
                long_window,
            } => Box::new(SmaCrossover::new(*short_window, *long_window)),
            Self::Rsi {
                period,
                oversold,
                overbought,
            } => Box::new(RsiReversion::new(*period, *oversold, *overbought)),
            Self::Macd { fast, slow, signal } => Box::new(MacdCrossover::new(*fast, *slow, *signal)),
            Self::Bollinger { period, num_std } => Box::new(BollingerReversion::new(*period, *num_std)),
            Self::Momentum { lookback, threshold } => Box::new(Momentum::new(*lookback, *threshold)),
            Self::Composite {
                aggregation,
                components,
            } => Box::new(Composite::new(
                components.iter().map(Self::build_unchecked).collect(),
                aggregation.clone(),
            )),
        }
    }
}

fn positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::out_of_range(field, 0.0, ">= 1"));
    }
    Ok(())
}

fn in_range(field: &'static str, value: f64, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= lo && value <= hi) {
        return Err(ConfigError::Invalid(format!("{field} = {value} must lie in [{lo}, {hi}]")));
    }
    Ok(())
}
