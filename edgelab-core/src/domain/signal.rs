//! Signal: directional intent aligned 1:1 with a bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Position direction requested by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Flat,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short, 0 for flat.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Flat => 0.0,
            Direction::Short => -1.0,
        }
    }

    /// Direction of a signed quantity or score.
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Direction::Long
        } else if value < 0.0 {
            Direction::Short
        } else {
            Direction::Flat
        }
    }
}

/// A directional signal for one bar.
///
/// `strength` lies in [-1, 1]; the engine sizes by its magnitude and takes the
/// side from `direction`. A signal may only depend on data at or before the
/// close of its bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDate,
    pub direction: Direction,
    pub strength: f64,
}

impl Signal {
    pub fn new(timestamp: NaiveDate, direction: Direction, strength: f64) -> Self {
        Self {
            timestamp,
            direction,
            strength,
        }
    }

    pub fn long(timestamp: NaiveDate) -> Self {
        Self::new(timestamp, Direction::Long, 1.0)
    }

    pub fn short(timestamp: NaiveDate) -> Self {
        Self::new(timestamp, Direction::Short, -1.0)
    }

    pub fn flat(timestamp: NaiveDate) -> Self {
        Self::new(timestamp, Direction::Flat, 0.0)
    }

    /// Conviction in [0, 1].
    pub fn conviction(&self) -> f64 {
        self.strength.abs().min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sign_and_of() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Flat.sign(), 0.0);
        assert_eq!(Direction::of(3.0), Direction::Long);
        assert_eq!(Direction::of(-0.1), Direction::Short);
        assert_eq!(Direction::of(0.0), Direction::Flat);
    }

    #[test]
    fn direction_serializes_screaming_case() {
        let json = serde_json::to_string(&Direction::Short).unwrap();
        assert_eq!(json, "\"SHORT\"");
    }

    #[test]
    fn conviction_is_magnitude() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(Signal::short(d).conviction(), 1.0);
        assert_eq!(Signal::new(d, Direction::Long, 0.4).conviction(), 0.4);
    }
}
