//! Trade setups and the persisted open-position record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::OptionRight;
use crate::market::MarketCode;

/// Strategy variant chosen by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    IronCondor,
    CallSpread,
    PutSpread,
    Skip,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IronCondor => write!(f, "iron_condor"),
            Self::CallSpread => write!(f, "call_spread"),
            Self::PutSpread => write!(f, "put_spread"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// How strongly the pin supports the setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
}

/// One credit-spread pair: sell the short strike, buy the long for protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadLeg {
    pub right: OptionRight,
    pub short_strike: Decimal,
    pub long_strike: Decimal,
}

impl SpreadLeg {
    /// Width between short and long strikes.
    pub fn width(&self) -> Decimal {
        (self.long_strike - self.short_strike).abs()
    }
}

/// Output of the strategy selector. Consumed once by the entry evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub strategy: StrategyKind,
    pub confidence: Confidence,
    pub legs: Vec<SpreadLeg>,
    pub spread_width: Decimal,
}

impl TradeSetup {
    pub fn skip() -> Self {
        Self {
            strategy: StrategyKind::Skip,
            confidence: Confidence::Medium,
            legs: Vec::new(),
            spread_width: Decimal::ZERO,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.strategy == StrategyKind::Skip
    }
}

/// An open credit-spread position.
///
/// Entry credit and strikes never change after creation. `peak_profit_pct`
/// is a high-water mark; `trailing_armed` and `hold_to_expiry` are one-way
/// latches flipped by the exit monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: String,
    pub market: MarketCode,
    pub strategy: StrategyKind,
    pub confidence: Confidence,
    pub legs: Vec<SpreadLeg>,
    pub contracts: u32,
    /// Net premium collected per contract at entry.
    pub entry_credit: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Points out-of-the-money at entry (nearest short strike to spot).
    pub entry_distance: Decimal,
    pub peak_profit_pct: f64,
    pub trailing_armed: bool,
    pub hold_to_expiry: bool,
}

impl OpenPosition {
    /// Build a position from a filled setup. Copies strikes and credit verbatim.
    pub fn from_setup(
        id: String,
        market: MarketCode,
        setup: &TradeSetup,
        contracts: u32,
        entry_credit: Decimal,
        entry_time: DateTime<Utc>,
        entry_distance: Decimal,
    ) -> Self {
        Self {
            id,
            market,
            strategy: setup.strategy,
            confidence: setup.confidence,
            legs: setup.legs.clone(),
            contracts,
            entry_credit,
            entry_time,
            entry_distance,
            peak_profit_pct: 0.0,
            trailing_armed: false,
            hold_to_expiry: false,
        }
    }

    /// Seconds this position has been open.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_time).num_seconds()
    }

    /// Hours this position has been open.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entry_time).num_seconds() as f64 / 3600.0
    }

    /// Compact strikes string for logs and the trade journal, e.g.
    /// "6120/6130C 5980/5970P".
    pub fn strikes_display(&self) -> String {
        self.legs
            .iter()
            .map(|leg| format!("{}/{}{}", leg.short_strike, leg.long_strike, leg.right))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
