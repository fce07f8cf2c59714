//! Distance-banded strategy selection.
//!
//! Evaluated in order, first match wins; boundary distances fall into the
//! nearer bucket. Pure function so the band partition is directly testable.

use rust_decimal::Decimal;
use tracing::debug;

use gexbot_core::chain::OptionRight;
use gexbot_core::market::{round_to_increment, MarketTuning};
use gexbot_core::position::{Confidence, SpreadLeg, StrategyKind, TradeSetup};

/// Choose a setup from the pin, current price, and volatility level.
pub fn select_setup(
    pin: Decimal,
    spot: Decimal,
    vol: f64,
    tuning: &MarketTuning,
    increment: Decimal,
) -> TradeSetup {
    let distance = round_to_increment((spot - pin).abs(), increment);
    let width = tuning.spread_width(vol);

    let setup = if distance <= tuning.near_max {
        iron_condor(pin, width, tuning, increment)
    } else if distance <= tuning.moderate_max {
        directional(
            pin,
            spot,
            width,
            tuning.moderate_pin_buffer,
            tuning.moderate_spot_buffer,
            Confidence::High,
            increment,
        )
    } else if distance <= tuning.far_max {
        // Pin is a weaker predictor out here: wider buffers, lower confidence.
        directional(
            pin,
            spot,
            width,
            tuning.far_pin_buffer,
            tuning.far_spot_buffer,
            Confidence::Medium,
            increment,
        )
    } else {
        TradeSetup::skip()
    };

    debug!(
        %pin,
        %spot,
        %distance,
        vol,
        strategy = %setup.strategy,
        "strategy selected"
    );
    setup
}

/// Price sitting on the pin: sell both sides around it.
fn iron_condor(
    pin: Decimal,
    width: Decimal,
    tuning: &MarketTuning,
    increment: Decimal,
) -> TradeSetup {
    let pin_rounded = round_to_increment(pin, increment);
    let call_short = pin_rounded + tuning.ic_wing_buffer;
    let put_short = pin_rounded - tuning.ic_wing_buffer;
    TradeSetup {
        strategy: StrategyKind::IronCondor,
        confidence: Confidence::High,
        legs: vec![
            SpreadLeg {
                right: OptionRight::Call,
                short_strike: call_short,
                long_strike: call_short + width,
            },
            SpreadLeg {
                right: OptionRight::Put,
                short_strike: put_short,
                long_strike: put_short - width,
            },
        ],
        spread_width: width,
    }
}

/// Price displaced from the pin: sell the side price is expected to retreat
/// from. The short strike is the more conservative of a pin-anchored and a
/// spot-anchored candidate.
fn directional(
    pin: Decimal,
    spot: Decimal,
    width: Decimal,
    pin_buffer: Decimal,
    spot_buffer: Decimal,
    confidence: Confidence,
    increment: Decimal,
) -> TradeSetup {
    if spot > pin {
        // Above the pin: expect a pullback, sell calls overhead.
        let short =
            round_to_increment((pin + pin_buffer).max(spot + spot_buffer), increment);
        TradeSetup {
            strategy: StrategyKind::CallSpread,
            confidence,
            legs: vec![SpreadLeg {
                right: OptionRight::Call,
                short_strike: short,
                long_strike: short + width,
            }],
            spread_width: width,
        }
    } else {
        // Below the pin: expect a rally back, sell puts underneath.
        let short =
            round_to_increment((pin - pin_buffer).min(spot - spot_buffer), increment);
        TradeSetup {
            strategy: StrategyKind::PutSpread,
            confidence,
            legs: vec![SpreadLeg {
                right: OptionRight::Put,
                short_strike: short,
                long_strike: short - width,
            }],
            spread_width: width,
        }
    }
}
