//! One-shot evaluation cycle orchestration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use gexbot_alerts::Notifier;
use gexbot_broker::with_backoff;
use gexbot_core::chain::OptionRight;
use gexbot_core::config::AppConfig;
use gexbot_core::errors::BrokerError;
use gexbot_core::market::MarketCode;
use gexbot_core::position::{OpenPosition, TradeSetup};
use gexbot_core::traits::{
    FillStatus, MarketData, MultiLegOrder, OrderGateway, OrderLeg, OrderSide,
};
use gexbot_data::{PositionStore, RunLock};
use gexbot_gex::rank_peaks;
use gexbot_strategy::select_setup;

use crate::credit::spread_credit;
use crate::gates::{pre_trade_gates, setup_gates, GateDecision, PreTradeContext, SetupContext};

/// How a cycle ended. Every variant is a normal, reported outcome.
#[derive(Debug)]
pub enum CycleOutcome {
    /// All gates passed and an order filled.
    Entered(OpenPosition),
    /// A gate rejected the cycle, or the order could not be filled.
    Rejected { reason: String },
    /// The signal or data was unusable; nothing to act on this cycle.
    NoSignal { reason: String },
}

pub struct EntryEvaluator {
    market: MarketCode,
    config: Arc<AppConfig>,
    data: Arc<dyn MarketData>,
    gateway: Arc<dyn OrderGateway>,
    store: PositionStore,
    notifier: Notifier,
    live: bool,
}

impl EntryEvaluator {
    pub fn new(
        market: MarketCode,
        config: Arc<AppConfig>,
        data: Arc<dyn MarketData>,
        gateway: Arc<dyn OrderGateway>,
        notifier: Notifier,
        live: bool,
    ) -> Self {
        let store = PositionStore::new(&config.store.positions_path);
        Self {
            market,
            config,
            data,
            gateway,
            store,
            notifier,
            live,
        }
    }

    /// Run one evaluation cycle at the current wall-clock time.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one evaluation cycle as of `now`. Exactly one evaluator may run
    /// at a time system-wide; the advisory lock is held for the whole cycle.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let _lock = self.acquire_lock().await?;

        let times = self.config.entry.resolve()?;
        let tuning = self.config.tuning(self.market);
        let params = self.market.params();
        let broker_cfg = &self.config.broker;
        let base_delay = Duration::from_millis(broker_cfg.retry_base_ms);

        let now_et = now.with_timezone(&New_York);
        let expiry = now_et.date_naive();

        let underlying = with_backoff("underlying", broker_cfg.max_retries, base_delay, || {
            self.data.underlying(self.market)
        })
        .await
        .context("failed to fetch underlying snapshot")?;
        let vol = with_backoff("vol_index", broker_cfg.max_retries, base_delay, || {
            self.data.vol_index(self.market)
        })
        .await
        .context("failed to fetch volatility index")?;

        let pre = pre_trade_gates(&PreTradeContext {
            now_et,
            cfg: &self.config.entry,
            times: &times,
            tuning,
            vol: &vol,
            underlying: &underlying,
            live: self.live,
        });
        if let GateDecision::Reject(reason) = pre {
            return Ok(self.rejected(reason));
        }

        let chain = match with_backoff("chain", broker_cfg.max_retries, base_delay, || {
            self.data.chain(self.market, expiry)
        })
        .await
        {
            Ok(chain) => chain,
            Err(err) if is_integrity(&err) => {
                return Ok(self.no_signal(format!("unusable chain: {err}")))
            }
            Err(err) => return Err(err).context("failed to fetch options chain"),
        };

        let Some(analysis) = rank_peaks(&chain, params.move_range_fraction) else {
            return Ok(self.no_signal("no GEX peak found".to_string()));
        };
        let pin = analysis.pin();
        let competing = analysis
            .competing
            .as_ref()
            .map(|c| c.is_competing)
            .unwrap_or(false);
        info!(
            market = %self.market,
            %pin,
            competing,
            spot = %chain.spot,
            "GEX pin extracted"
        );

        let setup = select_setup(pin, chain.spot, vol.value, tuning, params.strike_increment);
        if setup.is_skip() {
            return Ok(self.rejected(format!(
                "no tradeable edge: price {} too far from pin {pin}",
                chain.spot
            )));
        }

        let quote = match spread_credit(&chain, &setup) {
            Ok(quote) => quote,
            Err(err) => return Ok(self.no_signal(format!("cannot price setup: {err}"))),
        };

        let open_positions = self
            .store
            .load()?
            .iter()
            .filter(|p| p.market == self.market)
            .count();

        let post = setup_gates(&SetupContext {
            now_et,
            cfg: &self.config.entry,
            times: &times,
            tuning,
            spot: chain.spot,
            setup: &setup,
            credit: quote.credit,
            slippage: quote.slippage,
            open_positions,
        });
        if let GateDecision::Reject(reason) = post {
            return Ok(self.rejected(reason));
        }

        // All gates passed: place the all-or-none opening order.
        let order = build_opening_order(
            self.market,
            expiry,
            &setup,
            quote.credit,
            self.config.entry.contracts,
        );
        let order_id = with_backoff("place_multileg", broker_cfg.max_retries, base_delay, || {
            self.gateway.place_multileg(&order)
        })
        .await
        .context("failed to place opening order")?;

        let entry_credit = match self.await_fill(&order_id).await? {
            Some(net_price) => net_price,
            None => {
                return Ok(self.rejected(format!("order {order_id} did not fill")));
            }
        };

        let position = OpenPosition::from_setup(
            order_id,
            self.market,
            &setup,
            self.config.entry.contracts,
            entry_credit,
            now,
            entry_distance(&setup, chain.spot),
        );
        self.store
            .append(position.clone())
            .context("failed to persist new position")?;

        let target_price =
            price_at(entry_credit, 1.0 - self.config.exit.initial_target_pct());
        let stop_price = price_at(entry_credit, 1.0 + self.config.exit.stop_loss_pct);
        info!(
            market = %self.market,
            order_id = position.id,
            strategy = %position.strategy,
            strikes = position.strikes_display(),
            credit = %entry_credit,
            %target_price,
            %stop_price,
            "position opened"
        );
        self.notifier.send(format!(
            "OPENED {} {} {} x{} for {} credit (target {}, stop {})",
            self.market,
            position.strategy,
            position.strikes_display(),
            position.contracts,
            entry_credit,
            target_price,
            stop_price,
        ));

        Ok(CycleOutcome::Entered(position))
    }

    /// Poll fill status until the order fills, dies, or the poll attempts
    /// run out. On timeout the order is cancelled so a late fill can never
    /// create an untracked position.
    async fn await_fill(&self, order_id: &str) -> Result<Option<Decimal>> {
        let cfg = &self.config.broker;
        for attempt in 0..cfg.fill_poll_attempts {
            match self.gateway.fill_status(order_id).await {
                Ok(FillStatus::Filled { net_price }) => return Ok(Some(net_price)),
                Ok(FillStatus::Rejected { reason }) => {
                    warn!(order_id, reason, "opening order rejected");
                    return Ok(None);
                }
                Ok(FillStatus::Cancelled) => return Ok(None),
                Ok(FillStatus::Pending) => {}
                Err(err) if err.is_transient() => {
                    warn!(order_id, error = %err, "fill status check failed, will retry");
                }
                Err(err) => return Err(err).context("failed to query fill status"),
            }
            if attempt + 1 < cfg.fill_poll_attempts {
                tokio::time::sleep(Duration::from_secs(cfg.fill_poll_secs)).await;
            }
        }
        warn!(order_id, "order not filled in time, cancelling");
        with_backoff("cancel", cfg.max_retries, Duration::from_millis(cfg.retry_base_ms), || {
            self.gateway.cancel(order_id)
        })
        .await
        .context("failed to cancel unfilled order")?;
        Ok(None)
    }

    /// The run lock may be held briefly by the monitor's store writes, so
    /// retry a few times before declaring another evaluator active.
    async fn acquire_lock(&self) -> Result<RunLock> {
        let path = &self.config.store.lock_path;
        for _ in 0..5 {
            if let Ok(lock) = RunLock::try_acquire(path) {
                return Ok(lock);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        RunLock::try_acquire(path).context("another entry evaluator is running")
    }

    fn rejected(&self, reason: String) -> CycleOutcome {
        info!(market = %self.market, reason, "entry rejected");
        self.notifier
            .send(format!("SKIPPED {} entry: {reason}", self.market));
        CycleOutcome::Rejected { reason }
    }

    fn no_signal(&self, reason: String) -> CycleOutcome {
        info!(market = %self.market, reason, "cycle skipped");
        self.notifier
            .send(format!("NO SIGNAL for {}: {reason}", self.market));
        CycleOutcome::NoSignal { reason }
    }
}

fn is_integrity(err: &BrokerError) -> bool {
    matches!(err, BrokerError::Malformed(_) | BrokerError::MissingData(_))
}

fn build_opening_order(
    market: MarketCode,
    expiry: chrono::NaiveDate,
    setup: &TradeSetup,
    credit: Decimal,
    contracts: u32,
) -> MultiLegOrder {
    let mut legs = Vec::with_capacity(setup.legs.len() * 2);
    for leg in &setup.legs {
        legs.push(OrderLeg {
            right: leg.right,
            strike: leg.short_strike,
            side: OrderSide::SellToOpen,
            quantity: contracts,
        });
        legs.push(OrderLeg {
            right: leg.right,
            strike: leg.long_strike,
            side: OrderSide::BuyToOpen,
            quantity: contracts,
        });
    }
    MultiLegOrder {
        market,
        expiry,
        legs,
        net_price: credit,
        all_or_none: true,
        client_order_id: Uuid::new_v4().to_string(),
    }
}

/// Signed points out-of-the-money of the nearest short strike.
fn entry_distance(setup: &TradeSetup, spot: Decimal) -> Decimal {
    setup
        .legs
        .iter()
        .map(|leg| match leg.right {
            OptionRight::Call => leg.short_strike - spot,
            OptionRight::Put => spot - leg.short_strike,
        })
        .min()
        .unwrap_or(Decimal::ZERO)
}

fn price_at(credit: Decimal, factor: f64) -> Decimal {
    (credit * Decimal::from_f64(factor).unwrap_or(Decimal::ONE)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use gexbot_broker::PaperGateway;
    use gexbot_core::chain::{ChainSnapshot, OptionQuote, UnderlyingSnapshot, VolSnapshot};
    use rust_decimal_macros::dec;

    struct StubData {
        underlying: UnderlyingSnapshot,
        vol: VolSnapshot,
        chain: ChainSnapshot,
    }

    #[async_trait]
    impl MarketData for StubData {
        async fn underlying(
            &self,
            _market: MarketCode,
        ) -> Result<UnderlyingSnapshot, BrokerError> {
            Ok(self.underlying.clone())
        }

        async fn vol_index(&self, _market: MarketCode) -> Result<VolSnapshot, BrokerError> {
            Ok(self.vol.clone())
        }

        async fn chain(
            &self,
            _market: MarketCode,
            _expiry: NaiveDate,
        ) -> Result<ChainSnapshot, BrokerError> {
            Ok(self.chain.clone())
        }

        async fn option_quote(
            &self,
            _market: MarketCode,
            _expiry: NaiveDate,
            strike: Decimal,
            right: OptionRight,
        ) -> Result<OptionQuote, BrokerError> {
            self.chain
                .quote(strike, right)
                .cloned()
                .ok_or_else(|| BrokerError::MissingData(format!("{strike}{right}")))
        }
    }

    fn quote(
        strike: Decimal,
        right: OptionRight,
        bid: Decimal,
        ask: Decimal,
        oi: u64,
        gamma: f64,
    ) -> OptionQuote {
        OptionQuote {
            strike,
            right,
            bid,
            ask,
            open_interest: oi,
            gamma,
        }
    }

    /// Chain pinned hard at 6000 with juicy wing quotes for a condor.
    fn pinned_chain(expiry: NaiveDate) -> ChainSnapshot {
        ChainSnapshot {
            underlying: "SPX".to_string(),
            spot: dec!(6000),
            expiry,
            quotes: vec![
                quote(dec!(6000), OptionRight::Call, dec!(10), dec!(10.2), 5000, 0.004),
                quote(dec!(6015), OptionRight::Call, dec!(0.80), dec!(0.90), 0, 0.0),
                quote(dec!(6025), OptionRight::Call, dec!(0.15), dec!(0.25), 0, 0.0),
                quote(dec!(5985), OptionRight::Put, dec!(0.80), dec!(0.90), 0, 0.0),
                quote(dec!(5975), OptionRight::Put, dec!(0.15), dec!(0.25), 0, 0.0),
            ],
            as_of: Utc::now(),
        }
    }

    fn evaluator(dir: &tempfile::TempDir, data: StubData) -> EntryEvaluator {
        let mut config = AppConfig::default();
        config.store.positions_path = dir
            .path()
            .join("positions.json")
            .to_string_lossy()
            .into_owned();
        config.store.lock_path = dir.path().join("run.lock").to_string_lossy().into_owned();
        config.broker.fill_poll_secs = 0;
        EntryEvaluator::new(
            MarketCode::Spx,
            Arc::new(config),
            Arc::new(data),
            Arc::new(PaperGateway::new()),
            Notifier::disabled(),
            false,
        )
    }

    fn wednesday_11am_et() -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(2026, 8, 5, 11, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stub(expiry: NaiveDate) -> StubData {
        StubData {
            underlying: UnderlyingSnapshot {
                symbol: "SPX".to_string(),
                last: dec!(6000),
                today_open: dec!(6004),
                prev_close: dec!(6000),
                recent_closes: vec![],
            },
            vol: VolSnapshot {
                symbol: "VIX".to_string(),
                value: 14.0,
                value_5m_ago: Some(13.8),
            },
            chain: pinned_chain(expiry),
        }
    }

    #[tokio::test]
    async fn pinned_market_opens_an_iron_condor() {
        let dir = tempfile::tempdir().unwrap();
        let now = wednesday_11am_et();
        let expiry = now.with_timezone(&New_York).date_naive();
        let evaluator = evaluator(&dir, stub(expiry));

        let outcome = evaluator.run_cycle_at(now).await.unwrap();
        let CycleOutcome::Entered(position) = outcome else {
            panic!("expected an entry, got {outcome:?}");
        };
        // Credit: (0.80 - 0.25) x 2 sides = 1.10, paper-filled at the limit.
        assert_eq!(position.entry_credit, dec!(1.10));
        assert_eq!(position.strikes_display(), "6015/6025C 5985/5975P");
        assert_eq!(position.entry_distance, dec!(15));

        // And it must be persisted.
        let stored = evaluator.store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, position.id);
    }

    #[tokio::test]
    async fn gate_rejection_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let now = wednesday_11am_et();
        let expiry = now.with_timezone(&New_York).date_naive();
        let mut data = stub(expiry);
        data.vol.value = 45.0; // above the ceiling
        let evaluator = evaluator(&dir, data);

        let outcome = evaluator.run_cycle_at(now).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Rejected { ref reason } if reason.contains("ceiling")));
        assert!(evaluator.store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn early_clock_time_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let now = New_York
            .with_ymd_and_hms(2026, 8, 5, 9, 40, 0)
            .unwrap()
            .with_timezone(&Utc);
        let expiry = now.with_timezone(&New_York).date_naive();
        let evaluator = evaluator(&dir, stub(expiry));

        let outcome = evaluator.run_cycle_at(now).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn empty_chain_is_a_skip_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let now = wednesday_11am_et();
        let expiry = now.with_timezone(&New_York).date_naive();
        let mut data = stub(expiry);
        data.chain.quotes.clear();
        let evaluator = evaluator(&dir, data);

        let outcome = evaluator.run_cycle_at(now).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::NoSignal { .. }));
        assert!(evaluator.store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn position_limit_blocks_the_fourth_entry() {
        let dir = tempfile::tempdir().unwrap();
        let now = wednesday_11am_et();
        let expiry = now.with_timezone(&New_York).date_naive();
        let evaluator = evaluator(&dir, stub(expiry));

        for _ in 0..3 {
            let outcome = evaluator.run_cycle_at(now).await.unwrap();
            assert!(matches!(outcome, CycleOutcome::Entered(_)));
        }
        let outcome = evaluator.run_cycle_at(now).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Rejected { ref reason } if reason.contains("limit")));
        assert_eq!(evaluator.store.load().unwrap().len(), 3);
    }
}
