//! Proximity-weighted GEX peak scoring.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gexbot_core::chain::{ChainSnapshot, OptionRight};

/// Guard against division by zero for at-the-money strikes. Must stay far
/// below distance_fraction^5 for any off-pin strike (~1e-15 at 6 points on
/// SPX) so it never flattens the proximity weighting.
const DISTANCE_EPS: f64 = 1e-18;

/// Options contract multiplier.
const MULTIPLIER: f64 = 100.0;

/// How many ranked peaks the engine reports.
const TOP_PEAKS: usize = 3;

/// Competing-peak thresholds: second peak must carry more than half the
/// top score, and price must sit reasonably centered between the two.
const COMPETING_SCORE_RATIO: f64 = 0.5;
const COMPETING_DISTANCE_RATIO: f64 = 0.4;

/// One scored strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GexPeak {
    pub strike: Decimal,
    /// gamma x open interest x 100 x spot^2, calls positive, puts negative.
    pub signed_gex: f64,
    /// Points from the current price.
    pub distance: Decimal,
    /// signed_gex / (distance_fraction^5 + eps). The fifth power encodes
    /// how steeply 0DTE gamma influence decays with distance.
    pub score: f64,
}

/// Two comparably strong peaks straddling the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetingPeaks {
    pub is_competing: bool,
    pub peak1: GexPeak,
    pub peak2: GexPeak,
    /// |score2| / |score1|, in (0, 1].
    pub score_ratio: f64,
    /// Midpoint of the two strikes; meaningful only when `is_competing`.
    pub adjusted_pin: Decimal,
}

/// Engine output: ranked peaks plus the competing-peak assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakAnalysis {
    /// Top peaks by |score|, strongest first.
    pub peaks: Vec<GexPeak>,
    pub competing: Option<CompetingPeaks>,
}

impl PeakAnalysis {
    /// The pin the strategy selector should target: the adjusted midpoint
    /// when two peaks compete, otherwise the dominant peak's strike.
    pub fn pin(&self) -> Decimal {
        match &self.competing {
            Some(c) if c.is_competing => c.adjusted_pin,
            _ => self.peaks[0].strike,
        }
    }
}

/// Rank the proximity-weighted GEX peaks of a chain snapshot.
///
/// Returns `None` when the chain is empty, the spot is unusable, or no
/// strike inside the move range carries any exposure — the caller must
/// skip the cycle, not retry.
pub fn rank_peaks(chain: &ChainSnapshot, move_range_fraction: f64) -> Option<PeakAnalysis> {
    let spot = chain.spot.to_f64().filter(|s| *s > 0.0)?;
    if chain.quotes.is_empty() {
        return None;
    }

    // Signed exposure summed per strike across both rights.
    let mut by_strike: BTreeMap<Decimal, f64> = BTreeMap::new();
    for quote in &chain.quotes {
        let sign = match quote.right {
            OptionRight::Call => 1.0,
            OptionRight::Put => -1.0,
        };
        let exposure = sign * quote.gamma * quote.open_interest as f64 * MULTIPLIER * spot * spot;
        *by_strike.entry(quote.strike).or_insert(0.0) += exposure;
    }

    let max_distance = spot * move_range_fraction;
    let mut peaks: Vec<GexPeak> = by_strike
        .into_iter()
        .filter_map(|(strike, signed_gex)| {
            let strike_f = strike.to_f64()?;
            let distance = (strike_f - spot).abs();
            if distance > max_distance {
                return None;
            }
            let distance_fraction = distance / spot;
            let score = signed_gex / (distance_fraction.powi(5) + DISTANCE_EPS);
            Some(GexPeak {
                strike,
                signed_gex,
                distance: (strike - chain.spot).abs(),
                score,
            })
        })
        .collect();

    peaks.sort_by(|a, b| {
        b.score
            .abs()
            .partial_cmp(&a.score.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    peaks.truncate(TOP_PEAKS);

    if peaks.is_empty() || peaks[0].score == 0.0 {
        debug!(underlying = chain.underlying, "no usable GEX peak in range");
        return None;
    }

    let competing = if peaks.len() >= 2 {
        Some(assess_competing(&peaks[0], &peaks[1], chain.spot))
    } else {
        None
    };

    Some(PeakAnalysis { peaks, competing })
}

/// Decide whether two peaks compete for the pin. Symmetric in its peak
/// arguments: ratios are formed min-over-max.
pub fn assess_competing(a: &GexPeak, b: &GexPeak, spot: Decimal) -> CompetingPeaks {
    let (hi, lo) = if a.score.abs() >= b.score.abs() {
        (a, b)
    } else {
        (b, a)
    };
    let score_ratio = if hi.score.abs() > 0.0 {
        lo.score.abs() / hi.score.abs()
    } else {
        0.0
    };

    let opposite_sides = (a.strike > spot) != (b.strike > spot)
        && a.strike != spot
        && b.strike != spot;

    let (d1, d2) = (
        a.distance.to_f64().unwrap_or(0.0),
        b.distance.to_f64().unwrap_or(0.0),
    );
    let distance_ratio = if d1.max(d2) > 0.0 {
        d1.min(d2) / d1.max(d2)
    } else {
        0.0
    };

    let is_competing = opposite_sides
        && score_ratio > COMPETING_SCORE_RATIO
        && distance_ratio > COMPETING_DISTANCE_RATIO;

    CompetingPeaks {
        is_competing,
        peak1: hi.clone(),
        peak2: lo.clone(),
        score_ratio,
        adjusted_pin: (a.strike + b.strike) / Decimal::from(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gexbot_core::chain::OptionQuote;
    use rust_decimal_macros::dec;

    fn quote(strike: Decimal, right: OptionRight, oi: u64, gamma: f64) -> OptionQuote {
        OptionQuote {
            strike,
            right,
            bid: dec!(1.00),
            ask: dec!(1.10),
            open_interest: oi,
            gamma,
        }
    }

    fn chain(spot: Decimal, quotes: Vec<OptionQuote>) -> ChainSnapshot {
        ChainSnapshot {
            underlying: "SPX".to_string(),
            spot,
            expiry: Utc::now().date_naive(),
            quotes,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn signed_gex_sign_matches_option_type() {
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6010), OptionRight::Call, 500, 0.002),
                quote(dec!(5990), OptionRight::Put, 500, 0.002),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        let call_peak = analysis
            .peaks
            .iter()
            .find(|p| p.strike == dec!(6010))
            .unwrap();
        let put_peak = analysis
            .peaks
            .iter()
            .find(|p| p.strike == dec!(5990))
            .unwrap();
        assert!(call_peak.signed_gex > 0.0);
        assert!(put_peak.signed_gex < 0.0);
    }

    #[test]
    fn calls_and_puts_net_out_at_the_same_strike() {
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6010), OptionRight::Call, 500, 0.002),
                quote(dec!(6010), OptionRight::Put, 500, 0.002),
            ],
        );
        // Equal and opposite exposure at the only strike nets to zero.
        assert!(rank_peaks(&snapshot, 0.015).is_none());
    }

    #[test]
    fn nearer_strike_outscores_stronger_far_strike() {
        let snapshot = chain(
            dec!(6000),
            vec![
                // Closer, modest OI.
                quote(dec!(6005), OptionRight::Call, 200, 0.002),
                // Farther, much larger OI: the fifth-power decay still
                // favors the near strike.
                quote(dec!(6080), OptionRight::Call, 4000, 0.002),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        assert_eq!(analysis.peaks[0].strike, dec!(6005));
    }

    #[test]
    fn strikes_outside_move_range_are_ignored() {
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6050), OptionRight::Call, 100, 0.002),
                // 6200 is 3.3% away — outside a 1.5% range.
                quote(dec!(6200), OptionRight::Call, 100_000, 0.01),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        assert!(analysis.peaks.iter().all(|p| p.strike != dec!(6200)));
    }

    #[test]
    fn empty_chain_yields_no_peak() {
        assert!(rank_peaks(&chain(dec!(6000), vec![]), 0.015).is_none());
    }

    #[test]
    fn zero_spot_yields_no_peak() {
        let snapshot = chain(
            dec!(0),
            vec![quote(dec!(6010), OptionRight::Call, 500, 0.002)],
        );
        assert!(rank_peaks(&snapshot, 0.015).is_none());
    }

    #[test]
    fn straddling_peaks_of_comparable_strength_compete() {
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6020), OptionRight::Call, 1000, 0.002),
                quote(dec!(5980), OptionRight::Put, 900, 0.002),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        let competing = analysis.competing.as_ref().unwrap();
        assert!(competing.is_competing);
        assert_eq!(competing.adjusted_pin, dec!(6000));
        assert_eq!(analysis.pin(), dec!(6000));
    }

    #[test]
    fn same_side_peaks_do_not_compete() {
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6020), OptionRight::Call, 1000, 0.002),
                quote(dec!(6040), OptionRight::Call, 900, 0.002),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        let competing = analysis.competing.as_ref().unwrap();
        assert!(!competing.is_competing);
        assert_eq!(analysis.pin(), analysis.peaks[0].strike);
    }

    #[test]
    fn lopsided_distances_do_not_compete() {
        // Price sits nearly on top of one peak: min/max distance ratio
        // falls below 0.4 even though scores straddle.
        let snapshot = chain(
            dec!(6000),
            vec![
                quote(dec!(6005), OptionRight::Call, 100, 0.002),
                quote(dec!(5960), OptionRight::Put, 4500, 0.002),
            ],
        );
        let analysis = rank_peaks(&snapshot, 0.015).unwrap();
        if let Some(competing) = analysis.competing {
            assert!(!competing.is_competing);
        }
    }

    #[test]
    fn competing_assessment_is_symmetric() {
        let a = GexPeak {
            strike: dec!(6020),
            signed_gex: 1.0e9,
            distance: dec!(20),
            score: 4.0e12,
        };
        let b = GexPeak {
            strike: dec!(5985),
            signed_gex: -0.8e9,
            distance: dec!(15),
            score: -3.0e12,
        };
        let ab = assess_competing(&a, &b, dec!(6000));
        let ba = assess_competing(&b, &a, dec!(6000));
        assert_eq!(ab.is_competing, ba.is_competing);
        assert_eq!(ab.adjusted_pin, ba.adjusted_pin);
        assert!((ab.score_ratio - ba.score_ratio).abs() < 1e-12);
    }
}
