//! The per-tick exit decision.
//!
//! `apply_tick` updates the position's high-water mark and latches, then
//! evaluates the exit conditions in fixed priority order. At most one
//! condition fires per tick; a held position can only leave via the
//! emergency stop or expiration settlement.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::info;

use gexbot_core::config::{ExitConfig, ExitTimes};
use gexbot_core::position::OpenPosition;

use crate::hold::qualifies_for_hold;
use crate::stops::{emergency_stop_hit, stop_loss_hit};
use crate::targets::progressive_target;
use crate::trailing::trailing_breached;
use crate::types::{ExitDecision, ExitReason};

/// Everything one tick knows about one position.
#[derive(Debug, Clone)]
pub struct TickInput {
    pub now: DateTime<Utc>,
    /// Wall-clock time in the exchange timezone, for the EOD and expiry cutoffs.
    pub now_et: NaiveTime,
    /// Per-contract cost to close right now.
    pub current_value: Decimal,
    /// Volatility index print, when available this tick.
    pub vol: Option<f64>,
    /// Underlying spot, when available this tick (needed for settlement).
    pub spot: Option<Decimal>,
    /// Hours until expiration.
    pub tte_hours: f64,
}

/// Advance one position by one tick. Mutates the high-water mark and the
/// one-way latches; returns a decision when a terminal condition fires.
pub fn apply_tick(
    position: &mut OpenPosition,
    input: &TickInput,
    cfg: &ExitConfig,
    times: &ExitTimes,
) -> Option<ExitDecision> {
    if position.entry_credit <= Decimal::ZERO {
        return None;
    }
    let profit_pct = ((position.entry_credit - input.current_value)
        / position.entry_credit)
        .to_f64()?;

    // High-water mark first: every later rule reads it.
    if profit_pct > position.peak_profit_pct {
        position.peak_profit_pct = profit_pct;
    }

    // One-way latches.
    if !position.hold_to_expiry
        && qualifies_for_hold(
            profit_pct,
            input.vol,
            input.tte_hours,
            position.entry_distance,
            cfg,
        )
    {
        position.hold_to_expiry = true;
        info!(
            id = position.id,
            profit_pct, "position qualified for hold-to-expiration"
        );
    }
    if !position.trailing_armed && profit_pct >= cfg.trailing_activation {
        position.trailing_armed = true;
        info!(id = position.id, profit_pct, "trailing stop armed");
    }

    // Priority order: emergency -> stop -> trailing -> target -> EOD -> expiry.
    if emergency_stop_hit(profit_pct, cfg) {
        return Some(ExitDecision {
            reason: ExitReason::EmergencyStop,
            close_value: input.current_value,
        });
    }

    if !position.hold_to_expiry {
        let age_secs = position.age_secs(input.now);
        if stop_loss_hit(profit_pct, age_secs, cfg) {
            return Some(ExitDecision {
                reason: ExitReason::StopLoss,
                close_value: input.current_value,
            });
        }
        if position.trailing_armed && trailing_breached(profit_pct, position.peak_profit_pct, cfg)
        {
            return Some(ExitDecision {
                reason: ExitReason::TrailingStop,
                close_value: input.current_value,
            });
        }
        let target = progressive_target(position.age_hours(input.now), &cfg.target_knots);
        if profit_pct >= target {
            return Some(ExitDecision {
                reason: ExitReason::ProfitTarget,
                close_value: input.current_value,
            });
        }
        if input.now_et >= times.eod_close {
            return Some(ExitDecision {
                reason: ExitReason::EodClose,
                close_value: input.current_value,
            });
        }
    }

    if input.now_et >= times.expiry {
        // Settlement needs the spot; without it, wait for the next tick.
        let spot = input.spot?;
        return Some(ExitDecision {
            reason: ExitReason::Expiration,
            close_value: crate::pricing::settlement_value(position, spot),
        });
    }

    None
}
