//! Risk Manager: sizing, exit rules and exposure limits.
//!
//! The manager is stateless. Every call receives the portfolio snapshot and
//! the bar history up to the current bar, so any decision can be reproduced
//! (and tested) from its inputs alone.

pub mod correlation;
pub mod limits;
pub mod manager;
pub mod sizing;

pub use correlation::{CorrelationDetection, CorrelationGroups};
pub use limits::{RiskLimits, SizingConfig, SizingMethod};
pub use manager::{RiskContext, RiskDecision, RiskManager};
pub use sizing::{KellySizer, PositionSizer, VolatilitySizer};
