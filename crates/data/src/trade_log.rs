//! Append-only trade journal.
//!
//! One csv row per closed trade. Rows are only ever appended; the header
//! is written when the file is first created.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use gexbot_core::market::MarketCode;
use gexbot_core::position::{OpenPosition, StrategyKind};

/// One realized trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub order_id: String,
    pub market: MarketCode,
    pub strategy: StrategyKind,
    pub strikes: String,
    pub contracts: u32,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_credit: Decimal,
    pub exit_value: Decimal,
    pub exit_reason: String,
    pub realized_pnl: Decimal,
}

impl ClosedTrade {
    /// Build the journal row for a position closed at `exit_value` per
    /// contract. P/L is (credit - close cost) x contracts x 100.
    pub fn from_position(
        position: &OpenPosition,
        exit_time: DateTime<Utc>,
        exit_value: Decimal,
        exit_reason: &str,
    ) -> Self {
        let per_contract = position.entry_credit - exit_value;
        let realized_pnl =
            per_contract * Decimal::from(position.contracts) * Decimal::from(100);
        Self {
            order_id: position.id.clone(),
            market: position.market,
            strategy: position.strategy,
            strikes: position.strikes_display(),
            contracts: position.contracts,
            entry_time: position.entry_time,
            exit_time,
            entry_credit: position.entry_credit,
            exit_value,
            exit_reason: exit_reason.to_string(),
            realized_pnl,
        }
    }
}

pub struct TradeLog {
    path: PathBuf,
}

impl TradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file (with header) if needed.
    pub fn append(&self, trade: &ClosedTrade) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open trade log {}", self.path.display()))?;
        let needs_header = file
            .metadata()
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(trade)?;
        writer.flush()?;
        info!(
            order_id = trade.order_id,
            reason = trade.exit_reason,
            pnl = %trade.realized_pnl,
            "trade journaled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gexbot_core::chain::OptionRight;
    use gexbot_core::position::{Confidence, SpreadLeg, TradeSetup};
    use rust_decimal_macros::dec;

    fn closed(id: &str, credit: Decimal, exit_value: Decimal) -> ClosedTrade {
        let setup = TradeSetup {
            strategy: StrategyKind::PutSpread,
            confidence: Confidence::High,
            legs: vec![SpreadLeg {
                right: OptionRight::Put,
                short_strike: dec!(5950),
                long_strike: dec!(5940),
            }],
            spread_width: dec!(10),
        };
        let position = OpenPosition::from_setup(
            id.to_string(),
            MarketCode::Spx,
            &setup,
            2,
            credit,
            Utc::now(),
            dec!(25),
        );
        ClosedTrade::from_position(&position, Utc::now(), exit_value, "Profit Target")
    }

    #[test]
    fn pnl_scales_with_contracts_and_multiplier() {
        let trade = closed("x", dec!(1.50), dec!(0.60));
        // (1.50 - 0.60) x 2 contracts x 100 = 180.
        assert_eq!(trade.realized_pnl, dec!(180.00));
    }

    #[test]
    fn header_written_once_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = TradeLog::new(dir.path().join("trades.csv"));
        log.append(&closed("a", dec!(1.50), dec!(0.60))).unwrap();
        log.append(&closed("b", dec!(2.00), dec!(2.60))).unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("order_id,"));
        assert!(lines[1].contains("\"a\"") || lines[1].starts_with("a,"));
    }

    #[test]
    fn losing_trade_has_negative_pnl() {
        let trade = closed("x", dec!(2.00), dec!(2.60));
        assert_eq!(trade.realized_pnl, dec!(-120.00));
    }
}
