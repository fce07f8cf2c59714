//! Exit decision types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a position closed. Ordered by evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    EmergencyStop,
    StopLoss,
    TrailingStop,
    ProfitTarget,
    EodClose,
    Expiration,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmergencyStop => write!(f, "Emergency Stop"),
            Self::StopLoss => write!(f, "Stop Loss"),
            Self::TrailingStop => write!(f, "Trailing Stop"),
            Self::ProfitTarget => write!(f, "Profit Target"),
            Self::EodClose => write!(f, "EOD Close"),
            Self::Expiration => write!(f, "Expiration"),
        }
    }
}

impl ExitReason {
    /// Expirations settle without an order; everything else closes at market.
    pub fn needs_close_order(self) -> bool {
        !matches!(self, Self::Expiration)
    }
}

/// A terminal transition for one position on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub reason: ExitReason,
    /// Per-contract value the position closes at (or settles to).
    pub close_value: Decimal,
}
