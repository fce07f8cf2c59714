//! Credit and slippage math for a proposed setup.

use rust_decimal::Decimal;

use gexbot_core::chain::{ChainSnapshot, OptionQuote};
use gexbot_core::errors::BrokerError;
use gexbot_core::position::TradeSetup;

/// Quoted economics of a setup: the expected net credit (short bid minus
/// long ask per pair) and the total half-spread slippage across all legs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditQuote {
    pub credit: Decimal,
    pub slippage: Decimal,
}

/// Price a setup off the chain snapshot.
///
/// Fails with `MissingData` when a leg has no quote and `Malformed` when a
/// quote is unusable; both mean "skip this cycle", never retry.
pub fn spread_credit(chain: &ChainSnapshot, setup: &TradeSetup) -> Result<CreditQuote, BrokerError> {
    let mut credit = Decimal::ZERO;
    let mut slippage = Decimal::ZERO;

    for leg in &setup.legs {
        let short = leg_quote(chain, leg.short_strike, leg.right)?;
        let long = leg_quote(chain, leg.long_strike, leg.right)?;
        credit += short.bid - long.ask;
        slippage += short.half_spread() + long.half_spread();
    }

    Ok(CreditQuote { credit, slippage })
}

fn leg_quote(
    chain: &ChainSnapshot,
    strike: Decimal,
    right: gexbot_core::chain::OptionRight,
) -> Result<&OptionQuote, BrokerError> {
    let quote = chain.quote(strike, right).ok_or_else(|| {
        BrokerError::MissingData(format!("no quote for {strike}{right}"))
    })?;
    if quote.bid < Decimal::ZERO || quote.ask < quote.bid {
        return Err(BrokerError::Malformed(format!(
            "crossed or negative quote at {strike}{right}: {}x{}",
            quote.bid, quote.ask
        )));
    }
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gexbot_core::chain::OptionRight;
    use gexbot_core::position::{Confidence, SpreadLeg, StrategyKind};
    use rust_decimal_macros::dec;

    fn quote(strike: Decimal, right: OptionRight, bid: Decimal, ask: Decimal) -> OptionQuote {
        OptionQuote {
            strike,
            right,
            bid,
            ask,
            open_interest: 100,
            gamma: 0.001,
        }
    }

    fn chain(quotes: Vec<OptionQuote>) -> ChainSnapshot {
        ChainSnapshot {
            underlying: "SPX".to_string(),
            spot: dec!(6000),
            expiry: Utc::now().date_naive(),
            quotes,
            as_of: Utc::now(),
        }
    }

    fn condor() -> TradeSetup {
        TradeSetup {
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
        }
    }

    #[test]
    fn credit_is_short_bid_minus_long_ask_per_pair() {
        let chain = chain(vec![
            quote(dec!(6020), OptionRight::Call, dec!(1.20), dec!(1.30)),
            quote(dec!(6030), OptionRight::Call, dec!(0.55), dec!(0.65)),
            quote(dec!(5980), OptionRight::Put, dec!(1.10), dec!(1.20)),
            quote(dec!(5970), OptionRight::Put, dec!(0.50), dec!(0.60)),
        ]);
        let quote = spread_credit(&chain, &condor()).unwrap();
        // (1.20 - 0.65) + (1.10 - 0.60) = 1.05
        assert_eq!(quote.credit, dec!(1.05));
        // Four legs x 0.05 half-spread.
        assert_eq!(quote.slippage, dec!(0.20));
    }

    #[test]
    fn missing_leg_quote_skips_the_cycle() {
        let chain = chain(vec![quote(
            dec!(6020),
            OptionRight::Call,
            dec!(1.20),
            dec!(1.30),
        )]);
        let err = spread_credit(&chain, &condor()).unwrap_err();
        assert!(matches!(err, BrokerError::MissingData(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn crossed_quote_is_malformed() {
        let chain = chain(vec![
            quote(dec!(6020), OptionRight::Call, dec!(1.30), dec!(1.10)),
            quote(dec!(6030), OptionRight::Call, dec!(0.55), dec!(0.65)),
            quote(dec!(5980), OptionRight::Put, dec!(1.10), dec!(1.20)),
            quote(dec!(5970), OptionRight::Put, dec!(0.50), dec!(0.60)),
        ]);
        assert!(matches!(
            spread_credit(&chain, &condor()),
            Err(BrokerError::Malformed(_))
        ));
    }
}
