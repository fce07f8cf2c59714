//! Supported index markets and their fixed parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Index markets the bot trades. Anything else is a fatal configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCode {
    Spx,
    Rut,
}

impl MarketCode {
    pub fn params(self) -> MarketParams {
        match self {
            Self::Spx => MarketParams {
                code: self,
                symbol: "SPX",
                vol_symbol: "VIX",
                occ_root: "SPXW",
                strike_increment: Decimal::from(5),
                move_range_fraction: 0.015,
            },
            Self::Rut => MarketParams {
                code: self,
                symbol: "RUT",
                vol_symbol: "RVX",
                occ_root: "RUTW",
                strike_increment: Decimal::from(5),
                move_range_fraction: 0.020,
            },
        }
    }
}

impl std::fmt::Display for MarketCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spx => write!(f, "SPX"),
            Self::Rut => write!(f, "RUT"),
        }
    }
}

impl FromStr for MarketCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spx" => Ok(Self::Spx),
            "rut" => Ok(Self::Rut),
            other => anyhow::bail!("unsupported market code: {other}"),
        }
    }
}

/// Fixed per-market parameters (not tunable via config).
#[derive(Debug, Clone)]
pub struct MarketParams {
    pub code: MarketCode,
    pub symbol: &'static str,
    pub vol_symbol: &'static str,
    /// OCC root for the weekly (0DTE) option series.
    pub occ_root: &'static str,
    pub strike_increment: Decimal,
    /// Fraction of spot considered intraday-plausible for peak candidates.
    pub move_range_fraction: f64,
}

/// Tunable per-market strategy and gate parameters. All distances are index points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTuning {
    /// Pin-distance band edges for the strategy selector.
    pub near_max: Decimal,
    pub moderate_max: Decimal,
    pub far_max: Decimal,
    /// Short strikes sit this far beyond the pin on both sides of an iron condor.
    pub ic_wing_buffer: Decimal,
    /// Directional short-strike buffers, moderate band.
    pub moderate_pin_buffer: Decimal,
    pub moderate_spot_buffer: Decimal,
    /// Directional short-strike buffers, far band.
    pub far_pin_buffer: Decimal,
    pub far_spot_buffer: Decimal,
    /// Long strikes sit `spread_width(vol)` beyond the shorts; four vol bands.
    pub width_vol_bands: [f64; 3],
    pub width_by_band: [Decimal; 4],
    /// Gates.
    pub min_expected_move: Decimal,
    pub min_short_distance: Decimal,
    pub morning_min_credit: Decimal,
    pub afternoon_min_credit: Decimal,
}

impl MarketTuning {
    pub fn default_for(code: MarketCode) -> Self {
        match code {
            MarketCode::Spx => Self {
                near_max: Decimal::from(10),
                moderate_max: Decimal::from(25),
                far_max: Decimal::from(45),
                ic_wing_buffer: Decimal::from(15),
                moderate_pin_buffer: Decimal::from(20),
                moderate_spot_buffer: Decimal::from(15),
                far_pin_buffer: Decimal::from(30),
                far_spot_buffer: Decimal::from(25),
                width_vol_bands: [15.0, 20.0, 28.0],
                width_by_band: [
                    Decimal::from(10),
                    Decimal::from(15),
                    Decimal::from(20),
                    Decimal::from(25),
                ],
                min_expected_move: Decimal::from(20),
                min_short_distance: Decimal::from(5),
                morning_min_credit: Decimal::new(100, 2),
                afternoon_min_credit: Decimal::new(70, 2),
            },
            MarketCode::Rut => Self {
                near_max: Decimal::from(5),
                moderate_max: Decimal::from(15),
                far_max: Decimal::from(30),
                ic_wing_buffer: Decimal::from(10),
                moderate_pin_buffer: Decimal::from(12),
                moderate_spot_buffer: Decimal::from(10),
                far_pin_buffer: Decimal::from(20),
                far_spot_buffer: Decimal::from(15),
                width_vol_bands: [18.0, 24.0, 30.0],
                width_by_band: [
                    Decimal::from(5),
                    Decimal::from(10),
                    Decimal::from(15),
                    Decimal::from(20),
                ],
                min_expected_move: Decimal::from(12),
                min_short_distance: Decimal::from(3),
                morning_min_credit: Decimal::new(80, 2),
                afternoon_min_credit: Decimal::new(55, 2),
            },
        }
    }

    /// Spread width for the current volatility level. Wider at higher vol.
    pub fn spread_width(&self, vol: f64) -> Decimal {
        let band = self
            .width_vol_bands
            .iter()
            .position(|edge| vol < *edge)
            .unwrap_or(3);
        self.width_by_band[band]
    }
}

/// Round a price to the market's strike increment (nearest).
pub fn round_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    (value / increment).round() * increment
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn market_code_parses_case_insensitively() {
        assert_eq!("SPX".parse::<MarketCode>().unwrap(), MarketCode::Spx);
        assert_eq!("rut".parse::<MarketCode>().unwrap(), MarketCode::Rut);
        assert!("ndx".parse::<MarketCode>().is_err());
    }

    #[test]
    fn spread_width_widens_with_vol() {
        let tuning = MarketTuning::default_for(MarketCode::Spx);
        assert_eq!(tuning.spread_width(12.0), dec!(10));
        assert_eq!(tuning.spread_width(17.0), dec!(15));
        assert_eq!(tuning.spread_width(22.0), dec!(20));
        assert_eq!(tuning.spread_width(35.0), dec!(25));
        // Band edges belong to the higher band.
        assert_eq!(tuning.spread_width(15.0), dec!(15));
    }

    #[test]
    fn rounds_to_strike_increment() {
        assert_eq!(round_to_increment(dec!(6102.4), dec!(5)), dec!(6100));
        assert_eq!(round_to_increment(dec!(6103.0), dec!(5)), dec!(6105));
        assert_eq!(round_to_increment(dec!(6100), dec!(5)), dec!(6100));
    }
}
