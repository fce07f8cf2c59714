//! Main monitor loop — sweeps every open position each tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use gexbot_alerts::Notifier;
use gexbot_broker::with_backoff;
use gexbot_core::config::{AppConfig, ExitTimes};
use gexbot_core::market::MarketCode;
use gexbot_core::position::OpenPosition;
use gexbot_core::traits::{MarketData, MultiLegOrder, OrderGateway, OrderLeg, OrderSide};
use gexbot_data::{ClosedTrade, PositionStore, RunLock, TradeLog};

use crate::exit::{apply_tick, TickInput};
use crate::pricing;
use crate::types::ExitDecision;

pub struct ExitMonitor {
    config: Arc<AppConfig>,
    data: Arc<dyn MarketData>,
    gateway: Arc<dyn OrderGateway>,
    store: PositionStore,
    trade_log: TradeLog,
    notifier: Notifier,
}

impl ExitMonitor {
    pub fn new(
        config: Arc<AppConfig>,
        data: Arc<dyn MarketData>,
        gateway: Arc<dyn OrderGateway>,
        notifier: Notifier,
    ) -> Self {
        let store = PositionStore::new(&config.store.positions_path);
        let trade_log = TradeLog::new(&config.store.trade_log_path);
        Self {
            config,
            data,
            gateway,
            store,
            trade_log,
            notifier,
        }
    }

    /// Run the polling loop until ctrl-c. Each tick is one full synchronous
    /// sweep; the loop stays interruptible between ticks.
    pub async fn run(&self) -> Result<()> {
        let times = self.config.exit.resolve()?;
        info!(
            poll_secs = self.config.exit.poll_interval_secs,
            stop_loss = self.config.exit.stop_loss_pct,
            emergency = self.config.exit.emergency_stop_pct,
            eod_close = self.config.exit.eod_close,
            "exit monitor started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.exit.poll_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping monitor");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.sweep(Utc::now(), &times).await {
                        error!(error = %err, "sweep failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// One pass over every stored position. A failure on one position never
    /// halts the sweep of the others.
    pub async fn sweep(&self, now: DateTime<Utc>, times: &ExitTimes) -> Result<()> {
        let positions = self.store.load()?;
        if positions.is_empty() {
            return Ok(());
        }
        let now_et = now.with_timezone(&New_York).time();
        let mut vols: HashMap<MarketCode, Option<f64>> = HashMap::new();
        let mut spots: HashMap<MarketCode, Option<Decimal>> = HashMap::new();

        for mut position in positions {
            let market = position.market;
            // 0DTE: the expiration date is the entry date (exchange time).
            let expiry = position.entry_time.with_timezone(&New_York).date_naive();

            let value =
                match pricing::position_value(self.data.as_ref(), &position, expiry).await {
                    Ok(value) => value,
                    Err(err) => {
                        // No forced exit on missing data; try again next tick.
                        warn!(
                            id = position.id,
                            error = %err,
                            "pricing unavailable, skipping position this tick"
                        );
                        continue;
                    }
                };

            if !vols.contains_key(&market) {
                let vol = self.data.vol_index(market).await.ok().map(|v| v.value);
                vols.insert(market, vol);
            }
            let at_expiry = now_et >= times.expiry;
            if at_expiry && !spots.contains_key(&market) {
                let spot = self.data.underlying(market).await.ok().map(|u| u.last);
                spots.insert(market, spot);
            }

            let expiry_instant = New_York
                .from_local_datetime(&expiry.and_time(times.expiry))
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);
            let tte_hours =
                ((expiry_instant - now).num_seconds() as f64 / 3600.0).max(0.0);

            let input = TickInput {
                now,
                now_et,
                current_value: value,
                vol: vols.get(&market).copied().flatten(),
                spot: spots.get(&market).copied().flatten(),
                tte_hours,
            };

            let before = (
                position.peak_profit_pct,
                position.trailing_armed,
                position.hold_to_expiry,
            );
            match apply_tick(&mut position, &input, &self.config.exit, times) {
                Some(decision) => {
                    if let Err(err) = self.close_position(&position, &decision, now).await {
                        warn!(
                            id = position.id,
                            reason = %decision.reason,
                            error = %err,
                            "close failed, will retry next tick"
                        );
                        self.persist_update(&position).await?;
                    }
                }
                None => {
                    let after = (
                        position.peak_profit_pct,
                        position.trailing_armed,
                        position.hold_to_expiry,
                    );
                    if before != after {
                        self.persist_update(&position).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn close_position(
        &self,
        position: &OpenPosition,
        decision: &ExitDecision,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let exit_value = if decision.reason.needs_close_order() {
            let expiry = position.entry_time.with_timezone(&New_York).date_naive();
            let order = build_closing_order(position, expiry, decision.close_value);
            let cfg = &self.config.broker;
            with_backoff(
                "close_position",
                cfg.max_retries,
                Duration::from_millis(cfg.retry_base_ms),
                || self.gateway.close_position(&order),
            )
            .await
            .context("close order failed")?
        } else {
            decision.close_value
        };

        self.remove_from_store(&position.id).await?;
        let trade =
            ClosedTrade::from_position(position, now, exit_value, &decision.reason.to_string());
        self.trade_log.append(&trade)?;
        info!(
            id = position.id,
            reason = %decision.reason,
            exit_value = %exit_value,
            pnl = %trade.realized_pnl,
            "position closed"
        );
        self.notifier.send(format!(
            "CLOSED {} {} {} at {} ({}, P/L {})",
            position.market,
            position.strategy,
            position.strikes_display(),
            exit_value,
            decision.reason,
            trade.realized_pnl,
        ));
        Ok(())
    }

    /// Store writes serialize on the same advisory lock the entry evaluator
    /// holds for its cycle, so there is a single writer at a time. The
    /// acquire is a bounded try-loop rather than a blocking flock so an
    /// in-flight entry cycle cannot stall the poll loop's thread.
    async fn store_lock(&self, attempts: u32) -> Result<RunLock> {
        let path = &self.config.store.lock_path;
        for _ in 0..attempts {
            if let Ok(lock) = RunLock::try_acquire(path) {
                return Ok(lock);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        anyhow::bail!("store lock {path} still held after {attempts} attempts")
    }

    async fn persist_update(&self, position: &OpenPosition) -> Result<()> {
        let _lock = self.store_lock(8).await?;
        let mut positions = self.store.load()?;
        if let Some(slot) = positions.iter_mut().find(|p| p.id == position.id) {
            *slot = position.clone();
            self.store.save(&positions)?;
        }
        Ok(())
    }

    /// The position is already closed at the broker by the time this runs,
    /// so wait out even a full entry cycle before giving up.
    async fn remove_from_store(&self, id: &str) -> Result<()> {
        let _lock = self.store_lock(240).await?;
        self.store.remove(id)?;
        Ok(())
    }
}

/// Invert the opening legs: buy back the shorts, sell out the longs, at a
/// net debit of the current close value.
fn build_closing_order(
    position: &OpenPosition,
    expiry: chrono::NaiveDate,
    close_value: Decimal,
) -> MultiLegOrder {
    let mut legs = Vec::with_capacity(position.legs.len() * 2);
    for leg in &position.legs {
        legs.push(OrderLeg {
            right: leg.right,
            strike: leg.short_strike,
            side: OrderSide::BuyToClose,
            quantity: position.contracts,
        });
        legs.push(OrderLeg {
            right: leg.right,
            strike: leg.long_strike,
            side: OrderSide::SellToClose,
            quantity: position.contracts,
        });
    }
    MultiLegOrder {
        market: position.market,
        expiry,
        legs,
        net_price: -close_value,
        all_or_none: true,
        client_order_id: format!("close-{}", position.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use gexbot_broker::PaperGateway;
    use gexbot_core::chain::{
        ChainSnapshot, OptionQuote, OptionRight, UnderlyingSnapshot, VolSnapshot,
    };
    use gexbot_core::errors::BrokerError;
    use gexbot_core::position::{Confidence, SpreadLeg, StrategyKind, TradeSetup};
    use rust_decimal_macros::dec;

    /// Market data stub keyed by (strike, right).
    struct StubData {
        quotes: HashMap<(Decimal, OptionRight), (Decimal, Decimal)>,
        vol: f64,
        spot: Decimal,
    }

    #[async_trait]
    impl MarketData for StubData {
        async fn underlying(
            &self,
            _market: MarketCode,
        ) -> Result<UnderlyingSnapshot, BrokerError> {
            Ok(UnderlyingSnapshot {
                symbol: "SPX".to_string(),
                last: self.spot,
                today_open: self.spot,
                prev_close: self.spot,
                recent_closes: vec![],
            })
        }

        async fn vol_index(&self, _market: MarketCode) -> Result<VolSnapshot, BrokerError> {
            Ok(VolSnapshot {
                symbol: "VIX".to_string(),
                value: self.vol,
                value_5m_ago: None,
            })
        }

        async fn chain(
            &self,
            _market: MarketCode,
            _expiry: NaiveDate,
        ) -> Result<ChainSnapshot, BrokerError> {
            Err(BrokerError::MissingData("not used".to_string()))
        }

        async fn option_quote(
            &self,
            _market: MarketCode,
            _expiry: NaiveDate,
            strike: Decimal,
            right: OptionRight,
        ) -> Result<OptionQuote, BrokerError> {
            let (bid, ask) = self
                .quotes
                .get(&(strike, right))
                .copied()
                .ok_or_else(|| BrokerError::MissingData(format!("{strike}{right}")))?;
            Ok(OptionQuote {
                strike,
                right,
                bid,
                ask,
                open_interest: 0,
                gamma: 0.0,
            })
        }
    }

    fn call_position(id: &str, entry: DateTime<Utc>, credit: Decimal) -> OpenPosition {
        let setup = TradeSetup {
            strategy: StrategyKind::CallSpread,
            confidence: Confidence::High,
            legs: vec![SpreadLeg {
                right: OptionRight::Call,
                short_strike: dec!(6030),
                long_strike: dec!(6040),
            }],
            spread_width: dec!(10),
        };
        OpenPosition::from_setup(
            id.to_string(),
            MarketCode::Spx,
            &setup,
            1,
            credit,
            entry,
            dec!(30),
        )
    }

    fn monitor(dir: &tempfile::TempDir, data: StubData) -> ExitMonitor {
        let mut config = AppConfig::default();
        config.store.positions_path = dir
            .path()
            .join("positions.json")
            .to_string_lossy()
            .into_owned();
        config.store.trade_log_path =
            dir.path().join("trades.csv").to_string_lossy().into_owned();
        config.store.lock_path = dir.path().join("run.lock").to_string_lossy().into_owned();
        ExitMonitor::new(
            Arc::new(config),
            Arc::new(data),
            Arc::new(PaperGateway::new()),
            Notifier::disabled(),
        )
    }

    fn entry_at_11et() -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(2026, 8, 5, 11, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn times() -> ExitTimes {
        gexbot_core::config::ExitConfig::default().resolve().unwrap()
    }

    #[tokio::test]
    async fn profitable_position_closes_and_is_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry_at_11et();
        // Spread now worth 0.30 against a 2.00 credit: 85% profit, past
        // the 2h schedule point (65%).
        let data = StubData {
            quotes: HashMap::from([
                ((dec!(6030), OptionRight::Call), (dec!(0.35), dec!(0.45))),
                ((dec!(6040), OptionRight::Call), (dec!(0.05), dec!(0.15))),
            ]),
            vol: 20.0, // not calm: hold must not latch
            spot: dec!(6000),
        };
        let monitor = monitor(&dir, data);
        monitor
            .store
            .append(call_position("p1", entry, dec!(2.00)))
            .unwrap();

        let now = entry + chrono::Duration::hours(2);
        monitor.sweep(now, &times()).await.unwrap();

        assert!(monitor.store.load().unwrap().is_empty());
        let journal = std::fs::read_to_string(monitor.trade_log.path()).unwrap();
        assert!(journal.contains("Profit Target"));
        assert!(journal.contains("p1"));
    }

    #[tokio::test]
    async fn missing_quotes_leave_the_position_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry_at_11et();
        let data = StubData {
            quotes: HashMap::new(),
            vol: 14.0,
            spot: dec!(6000),
        };
        let monitor = monitor(&dir, data);
        monitor
            .store
            .append(call_position("p1", entry, dec!(2.00)))
            .unwrap();

        let now = entry + chrono::Duration::hours(1);
        monitor.sweep(now, &times()).await.unwrap();

        assert_eq!(monitor.store.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_unpriceable_position_does_not_halt_the_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry_at_11et();
        // Quotes exist only for the second position's strikes.
        let data = StubData {
            quotes: HashMap::from([
                ((dec!(5950), OptionRight::Put), (dec!(0.10), dec!(0.20))),
                ((dec!(5940), OptionRight::Put), (dec!(0.00), dec!(0.10))),
            ]),
            vol: 20.0,
            spot: dec!(6000),
        };
        let monitor = monitor(&dir, data);
        monitor
            .store
            .append(call_position("stuck", entry, dec!(2.00)))
            .unwrap();
        let put = TradeSetup {
            strategy: StrategyKind::PutSpread,
            confidence: Confidence::High,
            legs: vec![SpreadLeg {
                right: OptionRight::Put,
                short_strike: dec!(5950),
                long_strike: dec!(5940),
            }],
            spread_width: dec!(10),
        };
        monitor
            .store
            .append(OpenPosition::from_setup(
                "winner".to_string(),
                MarketCode::Spx,
                &put,
                1,
                dec!(1.00),
                entry,
                dec!(50),
            ))
            .unwrap();

        let now = entry + chrono::Duration::hours(2);
        monitor.sweep(now, &times()).await.unwrap();

        // "stuck" survives unpriced; "winner" (value 0.10, 90% profit) closed.
        let remaining = monitor.store.load().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "stuck");
    }

    #[tokio::test]
    async fn latch_updates_persist_without_an_exit() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry_at_11et();
        // 45% profit: arms the trail, but the 2h target (65%) is not met.
        let data = StubData {
            quotes: HashMap::from([
                ((dec!(6030), OptionRight::Call), (dec!(1.05), dec!(1.15))),
                ((dec!(6040), OptionRight::Call), (dec!(0.00), dec!(0.00))),
            ]),
            vol: 20.0,
            spot: dec!(6000),
        };
        let monitor = monitor(&dir, data);
        monitor
            .store
            .append(call_position("p1", entry, dec!(2.00)))
            .unwrap();

        let now = entry + chrono::Duration::hours(2);
        monitor.sweep(now, &times()).await.unwrap();

        let stored = &monitor.store.load().unwrap()[0];
        assert!(stored.trailing_armed);
        assert!((stored.peak_profit_pct - 0.45).abs() < 1e-9);
        assert!(!stored.hold_to_expiry);
    }
}
