//! Risk limits and sizing selection, validated before any run begins.

use serde::{Deserialize, Serialize};

use super::sizing::{KellySizer, PositionSizer, VolatilitySizer};
use crate::error::ConfigError;

/// Immutable risk parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest notional per position, as a fraction of equity. (0, 1].
    pub max_position_size_fraction: f64,
    /// Adverse move from entry that forces an exit. > 0.
    pub stop_loss_pct: f64,
    /// Favourable move from entry that forces an exit. > 0.
    pub take_profit_pct: f64,
    /// Give-back from the best close since entry that forces an exit. Off when unset. (0, 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop_pct: Option<f64>,
    /// Drawdown from peak equity that closes everything and halts trading. (0, 1].
    pub max_drawdown_pct: f64,
    /// Cap on combined exposure to a correlated group, as a fraction of equity. (0, 1].
    pub max_correlated_exposure_fraction: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size_fraction: 0.2,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.05,
            trailing_stop_pct: None,
            max_drawdown_pct: 0.20,
            max_correlated_exposure_fraction: 0.7,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("max_position_size_fraction", self.max_position_size_fraction)?;
        strictly_positive("stop_loss_pct", self.stop_loss_pct)?;
        strictly_positive("take_profit_pct", self.take_profit_pct)?;
        if let Some(trail) = self.trailing_stop_pct {
            if !(trail.is_finite() && trail > 0.0 && trail < 1.0) {
                return Err(ConfigError::out_of_range("trailing_stop_pct", trail, "(0, 1)"));
            }
        }
        unit_interval("max_drawdown_pct", self.max_drawdown_pct)?;
        unit_interval(
            "max_correlated_exposure_fraction",
            self.max_correlated_exposure_fraction,
        )?;
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "(0, 1]"))
    }
}

fn strictly_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "> 0"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMethod {
    Kelly,
    #[default]
    VolScaled,
}

/// Sizing strategy selection plus its tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub method: SizingMethod,
    /// Returns used for the trailing volatility estimate.
    pub vol_lookback: usize,
    /// Returns used for the win-rate / payoff estimate.
    pub kelly_lookback: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            method: SizingMethod::VolScaled,
            vol_lookback: 20,
            kelly_lookback: 60,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vol_lookback < 2 {
            return Err(ConfigError::out_of_range("vol_lookback", self.vol_lookback as f64, ">= 2"));
        }
        if self.kelly_lookback < 2 {
            return Err(ConfigError::out_of_range(
                "kelly_lookback",
                self.kelly_lookback as f64,
                ">= 2",
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> Box<dyn PositionSizer> {
        match self.method {
            SizingMethod::Kelly => Box::new(KellySizer::new(self.kelly_lookback)),
            SizingMethod::VolScaled => Box::new(VolatilitySizer::new(self.vol_lookback)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RiskLimits::default().validate().is_ok());
        assert!(SizingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_each_out_of_range_field() {
        let cases: [(RiskLimits, &str); 6] = [
            (
                RiskLimits {
                    max_position_size_fraction: 1.5,
                    ..Default::default()
                },
                "max_position_size_fraction",
            ),
            (
                RiskLimits {
                    stop_loss_pct: 0.0,
                    ..Default::default()
                },
                "stop_loss_pct",
            ),
            (
                RiskLimits {
                    take_profit_pct: -0.1,
                    ..Default::default()
                },
                "take_profit_pct",
            ),
            (
                RiskLimits {
                    trailing_stop_pct: Some(1.0),
                    ..Default::default()
                },
                "trailing_stop_pct",
            ),
            (
                RiskLimits {
                    max_drawdown_pct: f64::NAN,
                    ..Default::default()
                },
                "max_drawdown_pct",
            ),
            (
                RiskLimits {
                    max_correlated_exposure_fraction: 0.0,
                    ..Default::default()
                },
                "max_correlated_exposure_fraction",
            ),
        ];
        for (limits, expected) in cases {
            match limits.validate() {
                Err(ConfigError::OutOfRange { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected OutOfRange for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn upper_bound_is_inclusive() {
        let limits = RiskLimits {
            max_position_size_fraction: 1.0,
            max_drawdown_pct: 1.0,
            max_correlated_exposure_fraction: 1.0,
            ..Default::default()
        };
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn sizing_method_names() {
        let cfg: SizingConfig = serde_json::from_str(r#"{"method":"KELLY"}"#).unwrap();
        assert_eq!(cfg.method, SizingMethod::Kelly);
        assert_eq!(cfg.vol_lookback, 20);
        assert_eq!(cfg.build().name(), "kelly");
    }
}
