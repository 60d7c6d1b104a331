//! Correlated-instrument groups used by the diversification check.
//!
//! Groups are set by hand in config, or detected bar by bar from return
//! correlations over the history that ends at the bar being processed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::ConfigError;
use crate::indicators::mean;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationGroups {
    #[serde(default)]
    groups: Vec<BTreeSet<String>>,
}

impl CorrelationGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_group(members);
        self
    }

    /// Add a group; groups with fewer than two members are ignored.
    pub fn add_group<I, S>(&mut self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        if group.len() >= 2 {
            self.groups.push(group);
        }
    }

    pub fn groups(&self) -> &[BTreeSet<String>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every instrument sharing a group with `instrument`, excluding itself.
    pub fn peers_of(&self, instrument: &str) -> BTreeSet<&str> {
        self.groups
            .iter()
            .filter(|g| g.contains(instrument))
            .flat_map(|g| g.iter().map(String::as_str))
            .filter(|name| *name != instrument)
            .collect()
    }

    /// Add every group of `other`.
    pub fn merge(&mut self, other: CorrelationGroups) {
        self.groups.extend(other.groups);
    }

    /// Flag every pair whose Pearson correlation of daily returns is at
    /// least `threshold`. Each flagged pair becomes a two-member group.
    ///
    /// Each history is `(instrument, bars)`. Returns are compared over the
    /// common tail, limited to the last `lookback` returns when given.
    pub fn from_histories(histories: &[(&str, &[Bar])], threshold: f64, lookback: Option<usize>) -> Self {
        let returns: Vec<(&str, Vec<f64>)> = histories
            .iter()
            .map(|(name, bars)| (*name, tail_returns(bars, lookback)))
            .collect();

        let mut out = Self::new();
        for (i, (a, ra)) in returns.iter().enumerate() {
            for (b, rb) in &returns[i + 1..] {
                let n = ra.len().min(rb.len());
                if n < 2 {
                    continue;
                }
                let corr = pearson(&ra[ra.len() - n..], &rb[rb.len() - n..]);
                if corr.is_some_and(|c| c >= threshold) {
                    out.add_group([*a, *b]);
                }
            }
        }
        out
    }
}

/// Correlated pairs detected during the run.
///
/// `detect` only sees the histories it is handed; the engine hands it bars
/// up to and including the current one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationDetection {
    /// Flag pairs whose return correlation reaches this value. (0, 1].
    pub threshold: f64,
    /// Trailing returns compared. All available by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback: Option<usize>,
}

impl CorrelationDetection {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            lookback: None,
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::out_of_range("correlation.detect_threshold", self.threshold, "(0, 1]"));
        }
        if let Some(lookback) = self.lookback {
            if lookback < 2 {
                return Err(ConfigError::out_of_range("correlation.lookback", lookback as f64, ">= 2"));
            }
        }
        Ok(())
    }

    pub fn detect(&self, histories: &[(&str, &[Bar])]) -> CorrelationGroups {
        CorrelationGroups::from_histories(histories, self.threshold, self.lookback)
    }
}

fn tail_returns(bars: &[Bar], lookback: Option<usize>) -> Vec<f64> {
    let start = match lookback {
        Some(limit) => bars.len().saturating_sub(limit + 1),
        None => 0,
    };
    bars[start..].windows(2).map(|w| w[1].return_from(&w[0])).collect()
}

/// Pearson correlation; `None` when either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 {
        return None;
    }
    Some(cov / (va.sqrt() * vb.sqrt()))
}
