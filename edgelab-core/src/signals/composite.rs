//! Composite strategy: combines the discrete signals of several generators
//! through a declared aggregation rule.

use serde::{Deserialize, Serialize};

use super::{from_directions, SignalGenerator};
use crate::domain::{BarSeries, Direction, SignalSeries};

/// How component signals are combined at each bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// A direction wins when more than half of the components agree on it.
    MajorityVote,
    /// Weighted mean of component signs; LONG above `threshold`, SHORT below
    /// `-threshold`. Empty `weights` means equal weights.
    WeightedSum {
        #[serde(default)]
        weights: Vec<f64>,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

fn default_threshold() -> f64 {
    0.3
}

impl Default for Aggregation {
    fn default() -> Self {
        Self::WeightedSum {
            weights: Vec::new(),
            threshold: default_threshold(),
        }
    }
}

pub struct Composite {
    components: Vec<Box<dyn SignalGenerator>>,
    aggregation: Aggregation,
    name: String,
}

impl Composite {
    pub fn new(components: Vec<Box<dyn SignalGenerator>>, aggregation: Aggregation) -> Self {
        let inner: Vec<&str> = components.iter().map(|c| c.name()).collect();
        let rule = match aggregation {
            Aggregation::MajorityVote => "vote",
            Aggregation::WeightedSum { .. } => "weighted",
        };
        let name = format!("composite[{rule}]({})", inner.join("+"));
        Self {
            components,
            aggregation,
            name,
        }
    }

    fn combine(&self, signs: &[f64]) -> Direction {
        match &self.aggregation {
            Aggregation::MajorityVote => {
                let half = signs.len() as f64 / 2.0;
                let longs = signs.iter().filter(|s| **s > 0.0).count() as f64;
                let shorts = signs.iter().filter(|s| **s < 0.0).count() as f64;
                if longs > half {
                    Direction::Long
                } else if shorts > half {
                    Direction::Short
                } else {
                    Direction::Flat
                }
            }
            Aggregation::WeightedSum { weights, threshold } => {
                let (sum, total) = if weights.is_empty() {
                    (signs.iter().sum::<f64>(), signs.len() as f64)
                } else {
                    (
                        signs.iter().zip(weights).map(|(s, w)| s * w).sum::<f64>(),
                        weights.iter().sum::<f64>(),
                    )
                };
                if total <= 0.0 {
                    return Direction::Flat;
                }
                let score = sum / total;
                if score > *threshold {
                    Direction::Long
                } else if score < -threshold {
                    Direction::Short
                } else {
                    Direction::Flat
                }
            }
        }
    }
}

impl SignalGenerator for Composite {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, bars: &BarSeries) -> SignalSeries {
        let parts: Vec<SignalSeries> = self.components.iter().map(|c| c.generate(bars)).collect();
        let mut signs = vec![0.0; parts.len()];
        from_directions(bars, |i| {
            for (slot, part) in signs.iter_mut().zip(&parts) {
                *slot = part.get(i).map_or(0.0, |s| s.direction.sign());
            }
            self.combine(&signs)
        })
    }
}
