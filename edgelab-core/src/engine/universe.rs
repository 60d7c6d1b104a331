//! A validated set of instrument feeds sharing one timestamp axis.

use chrono::NaiveDate;

use crate::domain::{BarSeries, Marks, Signal, SignalSeries};
use crate::error::InputError;

/// Bars and their aligned signals for one instrument.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentFeed<'a> {
    pub bars: &'a BarSeries,
    pub signals: &'a SignalSeries,
}

impl<'a> InstrumentFeed<'a> {
    pub fn new(bars: &'a BarSeries, signals: &'a SignalSeries) -> Self {
        Self { bars, signals }
    }

    pub fn instrument(&self) -> &'a str {
        self.bars.instrument()
    }

    /// Signal at bar `t`. Alignment was checked when the universe was built.
    pub fn signal(&self, t: usize) -> Option<&'a Signal> {
        self.signals.get(t)
    }
}

/// Feeds sorted by instrument, all on the same timestamps.
#[derive(Debug, Clone)]
pub struct Universe<'a> {
    feeds: Vec<InstrumentFeed<'a>>,
}

impl<'a> Universe<'a> {
    pub fn new(mut feeds: Vec<InstrumentFeed<'a>>) -> Result<Self, InputError> {
        if feeds.is_empty() {
            return Err(InputError::Empty);
        }
        feeds.sort_by(|a, b| a.instrument().cmp(b.instrument()));
        for pair in feeds.windows(2) {
            if pair[0].instrument() == pair[1].instrument() {
                return Err(InputError::DuplicateInstrument(pair[0].instrument().to_string()));
            }
        }
        for feed in &feeds {
            feed.signals.ensure_aligned(feed.bars)?;
        }
        let reference = feeds[0].bars;
        for feed in &feeds[1..] {
            if feed.bars.len() != reference.len() || !feed.bars.timestamps().eq(reference.timestamps()) {
                return Err(InputError::UnalignedUniverse {
                    instrument: feed.instrument().to_string(),
                });
            }
        }
        Ok(Self { feeds })
    }

    /// Single-instrument universe.
    pub fn single(bars: &'a BarSeries, signals: &'a SignalSeries) -> Result<Self, InputError> {
        Self::new(vec![InstrumentFeed::new(bars, signals)])
    }

    pub fn feeds(&self) -> &[InstrumentFeed<'a>] {
        &self.feeds
    }

    pub fn instruments(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.feeds.iter().map(|f| f.instrument())
    }

    /// Number of bars on the shared axis.
    pub fn len(&self) -> usize {
        self.feeds[0].bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.feeds[0].bars.timestamps().collect()
    }

    /// Close of every instrument at bar `t`.
    pub fn marks_at(&self, t: usize) -> Marks {
        self.feeds
            .iter()
            .map(|f| (f.instrument().to_string(), f.bars.bars()[t].close))
            .collect()
    }
}
