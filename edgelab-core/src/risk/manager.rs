//! The Risk Manager: exit rules, sizing and approval of proposed positions.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::correlation::{CorrelationDetection, CorrelationGroups};
use super::limits::{RiskLimits, SizingConfig};
use super::sizing::PositionSizer;
use crate::domain::{Bar, Direction, ExitReason, Marks, PortfolioState, Signal};
use crate::error::ConfigError;

/// Tolerance for threshold comparisons on derived ratios.
const EPS: f64 = 1e-12;

/// What the manager may look at for one instrument at one bar.
///
/// `history` ends at the bar being processed. Nothing later is reachable.
/// `groups`, when set, replaces the manager's own correlation groups for
/// this bar.
#[derive(Debug, Clone, Copy)]
pub struct RiskContext<'a> {
    pub instrument: &'a str,
    pub history: &'a [Bar],
    pub marks: &'a Marks,
    pub groups: Option<&'a CorrelationGroups>,
}

impl<'a> RiskContext<'a> {
    pub fn new(instrument: &'a str, history: &'a [Bar], marks: &'a Marks) -> Self {
        Self {
            instrument,
            history,
            marks,
            groups: None,
        }
    }

    pub fn with_groups(mut self, groups: &'a CorrelationGroups) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Close of the current bar.
    pub fn price(&self) -> Option<f64> {
        self.history.last().map(|b| b.close)
    }
}

/// The manager's verdict for one instrument at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved_quantity_delta: f64,
    pub forced_exit: bool,
    pub exit_reason: Option<ExitReason>,
}

impl RiskDecision {
    pub fn hold() -> Self {
        Self {
            approved_quantity_delta: 0.0,
            forced_exit: false,
            exit_reason: None,
        }
    }

    /// Close `current` in full for `reason`.
    pub fn exit(current: f64, reason: ExitReason) -> Self {
        Self {
            approved_quantity_delta: -current,
            forced_exit: true,
            exit_reason: Some(reason),
        }
    }

    pub fn trade(delta: f64) -> Self {
        if delta == 0.0 {
            return Self::hold();
        }
        Self {
            approved_quantity_delta: delta,
            forced_exit: false,
            exit_reason: None,
        }
    }

    pub fn is_hold(&self) -> bool {
        !self.forced_exit && self.approved_quantity_delta == 0.0
    }
}

pub struct RiskManager {
    limits: RiskLimits,
    sizer: Box<dyn PositionSizer>,
    correlation: CorrelationGroups,
    detection: Option<CorrelationDetection>,
    rebalance_threshold: Option<f64>,
    commission: f64,
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("limits", &self.limits)
            .field("sizer", &self.sizer.name())
            .field("correlation", &self.correlation)
            .field("detection", &self.detection)
            .field("rebalance_threshold", &self.rebalance_threshold)
            .field("commission", &self.commission)
            .finish()
    }
}

impl RiskManager {
    pub fn new(limits: RiskLimits, sizing: &SizingConfig) -> Result<Self, ConfigError> {
        limits.validate()?;
        sizing.validate()?;
        Ok(Self::with_sizer(limits, sizing.build()))
    }

    /// Use a caller-supplied sizer. `limits` are assumed validated.
    pub fn with_sizer(limits: RiskLimits, sizer: Box<dyn PositionSizer>) -> Self {
        Self {
            limits,
            sizer,
            correlation: CorrelationGroups::default(),
            detection: None,
            rebalance_threshold: None,
            commission: 0.0,
        }
    }

    pub fn with_correlation(mut self, correlation: CorrelationGroups) -> Self {
        self.correlation = correlation;
        self
    }

    /// Detect correlated pairs at every bar, on top of the fixed groups.
    pub fn with_detection(mut self, detection: Option<CorrelationDetection>) -> Self {
        self.detection = detection;
        self
    }

    /// Resize same-direction positions when the sized target differs from the
    /// held quantity by more than this relative fraction. `None` holds them.
    pub fn with_rebalance_threshold(mut self, threshold: Option<f64>) -> Self {
        self.rebalance_threshold = threshold;
        self
    }

    /// Fixed fee per fill, reserved from cash when sizing buys.
    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn sizer_name(&self) -> &str {
        self.sizer.name()
    }

    pub fn correlation(&self) -> &CorrelationGroups {
        &self.correlation
    }

    /// Groups in force at the current bar. Each history must end at that bar.
    pub fn groups_at(&self, histories: &[(&str, &[Bar])]) -> Cow<'_, CorrelationGroups> {
        match &self.detection {
            None => Cow::Borrowed(&self.correlation),
            Some(detection) => {
                let mut groups = self.correlation.clone();
                groups.merge(detection.detect(histories));
                Cow::Owned(groups)
            }
        }
    }

    pub fn drawdown_breached(&self, state: &PortfolioState) -> bool {
        state.current_drawdown >= self.limits.max_drawdown_pct - EPS
    }

    /// Exit rule for an open position, first match wins: drawdown halt,
    /// then stop loss, then trailing stop, then take profit.
    ///
    /// The trailing stop is measured from the position's best close since
    /// entry, which the engine keeps current at every mark.
    pub fn check_exit(&self, state: &PortfolioState, instrument: &str, price: f64) -> Option<ExitReason> {
        let position = state.position(instrument)?;
        if self.drawdown_breached(state) {
            return Some(ExitReason::DrawdownHalt);
        }
        let ret = position.return_pct(price);
        if ret <= -self.limits.stop_loss_pct + EPS {
            return Some(ExitReason::StopLoss);
        }
        if let Some(trail) = self.limits.trailing_stop_pct {
            if position.retracement(price) >= trail - EPS {
                return Some(ExitReason::TrailingStop);
            }
        }
        if ret >= self.limits.take_profit_pct - EPS {
            return Some(ExitReason::TakeProfit);
        }
        None
    }

    /// Signed whole-unit position the signal asks for, before approval.
    ///
    /// Notional is `conviction * sizer fraction * equity`, so it never
    /// exceeds `max_position_size_fraction * equity`.
    pub fn target_quantity(&self, state: &PortfolioState, ctx: &RiskContext<'_>, signal: &Signal) -> f64 {
        let (Some(price), Direction::Long | Direction::Short) = (ctx.price(), signal.direction) else {
            return 0.0;
        };
        let equity = state.equity(ctx.marks);
        if equity <= 0.0 || price <= 0.0 {
            return 0.0;
        }
        let cap = self.limits.max_position_size_fraction;
        let fraction = self
            .sizer
            .fraction(ctx.history, signal.direction, cap)
            .clamp(0.0, cap);
        let units = (signal.conviction() * fraction * equity / price).floor();
        units * signal.direction.sign()
    }

    /// Scale `target` down to what the exposure and cash limits allow.
    ///
    /// Only the part of `target` that adds exposure is checked; reducing or
    /// closing `current` is always approved. A fully rejected increase comes
    /// back as `current` (or 0 on a reversal), never as an error.
    pub fn approve(&self, state: &PortfolioState, ctx: &RiskContext<'_>, current: f64, target: f64) -> f64 {
        let Some(price) = ctx.price().filter(|p| *p > 0.0) else {
            return current;
        };
        let same_side = current != 0.0 && target != 0.0 && current.signum() == target.signum();
        let held = if same_side { current.abs() } else { 0.0 };
        if target.abs() <= held {
            return target;
        }

        let sign = target.signum();
        let mut units = target.abs();

        let groups = ctx.groups.unwrap_or(&self.correlation);
        let peers = groups.peers_of(ctx.instrument);
        if !peers.is_empty() {
            let equity = state.equity(ctx.marks);
            let peer_exposure = state.exposure_of(peers.iter().copied(), ctx.marks);
            let room = self.limits.max_correlated_exposure_fraction * equity - peer_exposure;
            let allowed = (room.max(0.0) / price).floor().max(held);
            if units > allowed {
                tracing::trace!(
                    instrument = ctx.instrument,
                    requested = units,
                    allowed,
                    peer_exposure,
                    "correlated exposure cap"
                );
                units = allowed;
            }
        }

        if sign > 0.0 {
            let cover_cost = (-current).max(0.0) * price;
            let spendable = state.cash - cover_cost - self.commission;
            let affordable = current.max(0.0) + (spendable.max(0.0) / price).floor();
            if units > affordable {
                tracing::trace!(instrument = ctx.instrument, requested = units, affordable, "insufficient cash");
                units = affordable;
            }
        }

        units * sign
    }

    /// Full per-bar decision for one instrument: exit rules first, then the
    /// signal sized and approved.
    pub fn evaluate(&self, state: &PortfolioState, ctx: &RiskContext<'_>, signal: &Signal) -> RiskDecision {
        let Some(price) = ctx.price() else {
            return RiskDecision::hold();
        };
        let current = state.quantity(ctx.instrument);

        if let Some(reason) = self.check_exit(state, ctx.instrument, price) {
            return RiskDecision::exit(current, reason);
        }
        if state.trading_halted || self.drawdown_breached(state) {
            return RiskDecision::hold();
        }

        let target = match signal.direction {
            Direction::Flat => 0.0,
            direction if current != 0.0 && Direction::of(current) == direction => {
                let sized = self.target_quantity(state, ctx, signal);
                match self.rebalance_threshold {
                    Some(threshold) if (sized - current).abs() / current.abs() > threshold => sized,
                    _ => current,
                }
            }
            _ => self.target_quantity(state, ctx, signal),
        };

        let approved = self.approve(state, ctx, current, target);
        RiskDecision::trade(approved - current)
    }
}
