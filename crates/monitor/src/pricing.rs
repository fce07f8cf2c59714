//! Re-pricing open spreads and settling them at expiration.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use gexbot_core::chain::OptionRight;
use gexbot_core::errors::BrokerError;
use gexbot_core::position::OpenPosition;
use gexbot_core::traits::MarketData;

/// Current per-contract cost to close: short-leg mid minus long-leg mid,
/// summed across spread pairs and floored at zero.
pub async fn position_value(
    data: &dyn MarketData,
    position: &OpenPosition,
    expiry: NaiveDate,
) -> Result<Decimal, BrokerError> {
    let mut value = Decimal::ZERO;
    for leg in &position.legs {
        let short = data
            .option_quote(position.market, expiry, leg.short_strike, leg.right)
            .await?;
        let long = data
            .option_quote(position.market, expiry, leg.long_strike, leg.right)
            .await?;
        value += short.mid() - long.mid();
    }
    Ok(value.max(Decimal::ZERO))
}

/// Settlement value at expiration: zero when the shorts finish OTM,
/// intrinsic (capped at the spread width) when breached.
pub fn settlement_value(position: &OpenPosition, spot: Decimal) -> Decimal {
    position
        .legs
        .iter()
        .map(|leg| {
            let intrinsic = match leg.right {
                OptionRight::Call => spot - leg.short_strike,
                OptionRight::Put => leg.short_strike - spot,
            };
            intrinsic.clamp(Decimal::ZERO, leg.width())
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gexbot_core::market::MarketCode;
    use gexbot_core::position::{Confidence, SpreadLeg, StrategyKind, TradeSetup};
    use rust_decimal_macros::dec;

    fn condor_position() -> OpenPosition {
        let setup = TradeSetup {
            strategy: StrategyKind::IronCondor,
            confidence: Confidence::High,
            legs: vec![
                SpreadLeg {
                    right: OptionRight::Call,
                    short_strike: dec!(6020),
                    long_strike: dec!(6030),
                },
                SpreadLeg {
                    right: OptionRight::Put,
                    short_strike: dec!(5980),
                    long_strike: dec!(5970),
                },
            ],
            spread_width: dec!(10),
        };
        OpenPosition::from_setup(
            "x".to_string(),
            MarketCode::Spx,
            &setup,
            1,
            dec!(1.20),
            Utc::now(),
            dec!(20),
        )
    }

    #[test]
    fn otm_settlement_is_zero() {
        let position = condor_position();
        assert_eq!(settlement_value(&position, dec!(6000)), dec!(0));
    }

    #[test]
    fn breached_call_side_settles_at_intrinsic() {
        let position = condor_position();
        assert_eq!(settlement_value(&position, dec!(6024)), dec!(4));
    }

    #[test]
    fn settlement_caps_at_the_spread_width() {
        let position = condor_position();
        // Spot blasted through both call strikes: loss caps at the width.
        assert_eq!(settlement_value(&position, dec!(6100)), dec!(10));
    }

    #[test]
    fn breached_put_side_settles_at_intrinsic() {
        let position = condor_position();
        assert_eq!(settlement_value(&position, dec!(5973)), dec!(7));
    }
}
