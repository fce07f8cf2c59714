//! Entry gate battery.
//!
//! Gates run in a fixed order and the first rejection wins. A rejection is
//! a normal outcome, not an error: each carries a reason string that flows
//! to the log and the notification channel.

use chrono::{DateTime, Datelike, Duration};
use chrono_tz::Tz;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use gexbot_core::chain::{UnderlyingSnapshot, VolSnapshot};
use gexbot_core::config::{EntryConfig, EntryTimes};
use gexbot_core::market::MarketTuning;
use gexbot_core::position::TradeSetup;

use crate::rsi::rsi;

/// Trading days per year, for the expected-move estimate.
const TRADING_DAYS: f64 = 252.0;

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Reject(String),
}

impl GateDecision {
    fn reject(reason: impl Into<String>) -> Self {
        Self::Reject(reason.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Everything the pre-signal gates need.
pub struct PreTradeContext<'a> {
    pub now_et: DateTime<Tz>,
    pub cfg: &'a EntryConfig,
    pub times: &'a EntryTimes,
    pub tuning: &'a MarketTuning,
    pub vol: &'a VolSnapshot,
    pub underlying: &'a UnderlyingSnapshot,
    pub live: bool,
}

/// Gates that run before any signal work: time-of-day, volatility regime,
/// expected move, momentum, and the overnight gap.
pub fn pre_trade_gates(ctx: &PreTradeContext<'_>) -> GateDecision {
    let now = ctx.now_et.time();

    if now < ctx.times.window_start || now > ctx.times.window_end {
        return GateDecision::reject(format!(
            "outside entry window ({}-{})",
            ctx.cfg.window_start, ctx.cfg.window_end
        ));
    }
    if now >= ctx.times.last_entry {
        return GateDecision::reject(format!(
            "past last-entry cutoff ({})",
            ctx.cfg.last_entry
        ));
    }
    let blackout_end = ctx.times.market_open + Duration::minutes(ctx.cfg.open_blackout_mins);
    if now < blackout_end {
        return GateDecision::reject(format!(
            "inside post-open blackout (first {} min)",
            ctx.cfg.open_blackout_mins
        ));
    }

    if ctx.vol.value < ctx.cfg.vol_floor {
        return GateDecision::reject(format!(
            "volatility {:.1} below floor {:.1}",
            ctx.vol.value, ctx.cfg.vol_floor
        ));
    }
    if ctx.vol.value > ctx.cfg.vol_ceiling {
        return GateDecision::reject(format!(
            "volatility {:.1} above ceiling {:.1}",
            ctx.vol.value, ctx.cfg.vol_ceiling
        ));
    }
    if let Some(spike) = ctx.vol.spike_fraction() {
        if spike > ctx.cfg.max_vol_spike {
            return GateDecision::reject(format!(
                "volatility spiked {:.1}% in the last 5 minutes",
                spike * 100.0
            ));
        }
    }

    let spot = ctx.underlying.last.to_f64().unwrap_or(0.0);
    let expected_move = spot * ctx.vol.value / 100.0 / TRADING_DAYS.sqrt();
    let min_move = ctx.tuning.min_expected_move.to_f64().unwrap_or(0.0);
    if expected_move < min_move {
        return GateDecision::reject(format!(
            "expected move {expected_move:.1} below minimum {min_move:.1}"
        ));
    }

    if ctx.live {
        let weekday = ctx.now_et.weekday();
        if ctx.times.excluded_weekdays.contains(&weekday) {
            return GateDecision::reject(format!("weekday {weekday} excluded"));
        }
        if let Some(value) = rsi(&ctx.underlying.recent_closes, ctx.cfg.rsi_period) {
            if value < ctx.cfg.rsi_low || value > ctx.cfg.rsi_high {
                return GateDecision::reject(format!(
                    "rsi {value:.1} outside [{:.0}, {:.0}]",
                    ctx.cfg.rsi_low, ctx.cfg.rsi_high
                ));
            }
        }
    }

    if ctx.underlying.prev_close <= Decimal::ZERO {
        return GateDecision::reject("no usable previous close".to_string());
    }
    let gap = ((ctx.underlying.today_open - ctx.underlying.prev_close)
        / ctx.underlying.prev_close)
        .abs();
    let max_gap = Decimal::from_f64(ctx.cfg.max_overnight_gap).unwrap_or(Decimal::ZERO);
    if gap > max_gap {
        return GateDecision::reject(format!(
            "overnight gap {:.2}% too large",
            gap.to_f64().unwrap_or(0.0) * 100.0
        ));
    }

    GateDecision::Pass
}

/// Everything the post-signal gates need.
pub struct SetupContext<'a> {
    pub now_et: DateTime<Tz>,
    pub cfg: &'a EntryConfig,
    pub times: &'a EntryTimes,
    pub tuning: &'a MarketTuning,
    pub spot: Decimal,
    pub setup: &'a TradeSetup,
    pub credit: Decimal,
    pub slippage: Decimal,
    pub open_positions: usize,
}

/// Gates that need the chosen strikes and quoted credit.
pub fn setup_gates(ctx: &SetupContext<'_>) -> GateDecision {
    let too_close = ctx
        .setup
        .legs
        .iter()
        .map(|leg| (leg.short_strike - ctx.spot).abs())
        .min();
    if let Some(distance) = too_close {
        if distance < ctx.tuning.min_short_distance {
            return GateDecision::reject(format!(
                "short strike {distance} points from price (min {})",
                ctx.tuning.min_short_distance
            ));
        }
    }

    if ctx.credit <= Decimal::ZERO {
        return GateDecision::reject("no net credit available".to_string());
    }
    let max_slippage = ctx.credit
        * Decimal::from_f64(ctx.cfg.max_slippage_fraction).unwrap_or(Decimal::ZERO);
    if ctx.slippage > max_slippage {
        return GateDecision::reject(format!(
            "spread quality too poor: slippage {} exceeds {} ({}% of credit)",
            ctx.slippage,
            max_slippage,
            (ctx.cfg.max_slippage_fraction * 100.0) as u32
        ));
    }

    let min_credit = if ctx.now_et.time() < ctx.times.midday_cutoff {
        ctx.tuning.morning_min_credit
    } else {
        ctx.tuning.afternoon_min_credit
    };
    if ctx.credit < min_credit {
        return GateDecision::reject(format!(
            "credit {} below minimum {min_credit}",
            ctx.credit
        ));
    }

    if ctx.open_positions >= ctx.cfg.max_open_positions {
        return GateDecision::reject(format!(
            "{} open positions at limit {}",
            ctx.open_positions, ctx.cfg.max_open_positions
        ));
    }

    GateDecision::Pass
}
