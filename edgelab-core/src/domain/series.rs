//! Validated bar and signal series.
//!
//! A `BarSeries` can only be built from non-empty, strictly increasing, sane
//! bars; the engine never re-checks those properties. A `SignalSeries` is
//! checked against a bar series with `ensure_aligned` before a run starts.

use super::bar::Bar;
use super::signal::Signal;
use crate::error::InputError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ordered, gap-checked bars for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    instrument: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self, InputError> {
        if bars.is_empty() {
            return Err(InputError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(InputError::MalformedBar {
                    index,
                    reason: format!(
                        "o={} h={} l={} c={}",
                        bar.open, bar.high, bar.low, bar.close
                    ),
                });
            }
        }
        if let Some(index) = first_non_increasing(bars.iter().map(|b| b.timestamp)) {
            return Err(InputError::NonIncreasingTimestamps { index });
        }
        Ok(Self {
            instrument: instrument.into(),
            bars,
        })
    }

    /// Build from `(timestamp, close)` pairs, with flat OHLC bars.
    pub fn from_closes(
        instrument: impl Into<String>,
        closes: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, InputError> {
        let bars = closes
            .into_iter()
            .map(|(ts, close)| Bar::flat(ts, close))
            .collect();
        Self::new(instrument, bars)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: construction rejects empty series.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Bars with timestamps in `[start, end]`, or `None` if that slice is empty.
    pub fn slice_range(&self, start: NaiveDate, end: NaiveDate) -> Option<Self> {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .cloned()
            .collect();
        if bars.is_empty() {
            return None;
        }
        Some(Self {
            instrument: self.instrument.clone(),
            bars,
        })
    }

    /// Simple close-to-close returns; `returns[i]` is the return into bar `i + 1`.
    pub fn returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| w[1].return_from(&w[0]))
            .collect()
    }
}

/// Signals aligned 1:1 with a bar series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSeries {
    signals: Vec<Signal>,
}

impl SignalSeries {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }

    /// One FLAT signal per bar.
    pub fn flat_for(bars: &BarSeries) -> Self {
        Self::new(bars.timestamps().map(Signal::flat).collect())
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Signal> {
        self.signals.get(index)
    }

    /// Check this series is aligned 1:1 with `bars` and well-formed.
    pub fn ensure_aligned(&self, bars: &BarSeries) -> Result<(), InputError> {
        if self.signals.is_empty() {
            return Err(InputError::Empty);
        }
        if self.signals.len() != bars.len() {
            return Err(InputError::LengthMismatch {
                bars: bars.len(),
                signals: self.signals.len(),
            });
        }
        for (index, (signal, bar)) in self.signals.iter().zip(bars.bars()).enumerate() {
            if signal.timestamp != bar.timestamp {
                return Err(InputError::Misaligned {
                    index,
                    bar: bar.timestamp,
                    signal: signal.timestamp,
                });
            }
            if !signal.strength.is_finite() || signal.strength.abs() > 1.0 {
                return Err(InputError::StrengthOutOfRange {
                    index,
                    value: signal.strength,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<Signal> for SignalSeries {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn first_non_increasing(timestamps: impl Iterator<Item = NaiveDate>) -> Option<usize> {
    let mut prev: Option<NaiveDate> = None;
    for (index, ts) in timestamps.enumerate() {
        if prev.is_some_and(|p| ts <= p) {
            return Some(index);
        }
        prev = Some(ts);
    }
    None
}
