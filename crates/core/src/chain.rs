//! Options chain snapshot types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// One quote row in a chain snapshot: strike, right, market, open interest, gamma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: Decimal,
    pub right: OptionRight,
    pub bid: Decimal,
    pub ask: Decimal,
    pub open_interest: u64,
    pub gamma: f64,
}

impl OptionQuote {
    /// Midpoint of bid/ask.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::from(2)
    }

    /// Half the bid/ask spread — the per-leg slippage estimate.
    pub fn half_spread(&self) -> Decimal {
        (self.ask - self.bid) / Decimal::from(2)
    }
}

/// Point-in-time options chain for a single expiration.
///
/// Immutable once fetched; consumed by the peak engine and credit math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub underlying: String,
    pub spot: Decimal,
    pub expiry: NaiveDate,
    pub quotes: Vec<OptionQuote>,
    pub as_of: DateTime<Utc>,
}

impl ChainSnapshot {
    /// Find the quote for an exact strike/right pair.
    pub fn quote(&self, strike: Decimal, right: OptionRight) -> Option<&OptionQuote> {
        self.quotes
            .iter()
            .find(|q| q.strike == strike && q.right == right)
    }
}

/// Underlying index snapshot used by the entry gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingSnapshot {
    pub symbol: String,
    pub last: Decimal,
    pub today_open: Decimal,
    pub prev_close: Decimal,
    /// Most recent minute closes, oldest first. Used for the RSI gate.
    pub recent_closes: Vec<Decimal>,
}

/// Volatility index snapshot (e.g. VIX) with a short lookback for spike detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolSnapshot {
    pub symbol: String,
    pub value: f64,
    /// Value roughly five minutes ago, when available.
    pub value_5m_ago: Option<f64>,
}

impl VolSnapshot {
    /// Fractional change over the last five minutes, if a lookback exists.
    pub fn spike_fraction(&self) -> Option<f64> {
        self.value_5m_ago.and_then(|prev| {
            if prev <= 0.0 {
                None
            } else {
                Some((self.value - prev) / prev)
            }
        })
    }
}
