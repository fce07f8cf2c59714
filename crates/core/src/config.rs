//! Typed application configuration.
//!
//! Loaded by [`crate::config_loader::ConfigLoader`]; every section carries
//! working defaults so a bare config file runs the paper setup. Validation
//! happens once at startup — an unparseable time or unknown weekday is a
//! fatal configuration error, raised before any position is touched.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{MarketCode, MarketTuning};

/// Regular-session open, US equities (Eastern).
const MARKET_OPEN: &str = "09:30";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub alerts: AlertsConfig,
    pub store: StoreConfig,
    pub entry: EntryConfig,
    pub exit: ExitConfig,
    pub spx: MarketTuning,
    pub rut: MarketTuning,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            alerts: AlertsConfig::default(),
            store: StoreConfig::default(),
            entry: EntryConfig::default(),
            exit: ExitConfig::default(),
            spx: MarketTuning::default_for(MarketCode::Spx),
            rut: MarketTuning::default_for(MarketCode::Rut),
        }
    }
}

impl AppConfig {
    pub fn tuning(&self, market: MarketCode) -> &MarketTuning {
        match market {
            MarketCode::Spx => &self.spx,
            MarketCode::Rut => &self.rut,
        }
    }

    /// Fail fast on anything a later cycle would trip over.
    pub fn validate(&self) -> Result<()> {
        self.entry.resolve()?;
        self.exit.resolve()?;
        anyhow::ensure!(
            self.exit.emergency_stop_pct > self.exit.stop_loss_pct,
            "emergency stop ({}) must be deeper than the stop loss ({})",
            self.exit.emergency_stop_pct,
            self.exit.stop_loss_pct
        );
        anyhow::ensure!(
            !self.exit.target_knots.is_empty(),
            "profit-target schedule must have at least one knot"
        );
        anyhow::ensure!(
            self.exit
                .target_knots
                .windows(2)
                .all(|w| w[0].hours < w[1].hours && w[0].pct <= w[1].pct),
            "profit-target schedule must be sorted and non-decreasing"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub base_url: String,
    pub account_id: String,
    pub api_token: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    /// Fill polling after order placement.
    pub fill_poll_secs: u64,
    pub fill_poll_attempts: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.tradier.com/v1".to_string(),
            account_id: String::new(),
            api_token: String::new(),
            timeout_secs: 10,
            requests_per_minute: 120,
            max_retries: 3,
            retry_base_ms: 500,
            fill_poll_secs: 2,
            fill_poll_attempts: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Discord-compatible webhook; alerts are disabled when unset.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub positions_path: String,
    pub trade_log_path: String,
    pub lock_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            positions_path: "state/positions.json".to_string(),
            trade_log_path: "state/trades.csv".to_string(),
            lock_path: "state/gexbot.lock".to_string(),
        }
    }
}

/// Entry-gate parameters. Times are `HH:MM`, Eastern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    pub window_start: String,
    pub window_end: String,
    /// Absolute last-trade cutoff near the close; nothing opens after this.
    pub last_entry: String,
    /// Morning/afternoon split for the minimum-credit gate.
    pub midday_cutoff: String,
    pub open_blackout_mins: i64,
    pub vol_floor: f64,
    pub vol_ceiling: f64,
    /// Max fractional vol rise over the last five minutes.
    pub max_vol_spike: f64,
    /// Max |open - prev_close| / prev_close.
    pub max_overnight_gap: f64,
    pub rsi_period: usize,
    pub rsi_low: f64,
    pub rsi_high: f64,
    /// Weekdays excluded in live mode ("mon".."fri").
    pub excluded_weekdays: Vec<String>,
    /// Total half-spread slippage must not exceed this fraction of the credit.
    pub max_slippage_fraction: f64,
    pub max_open_positions: usize,
    /// Contracts per spread. Position sizing is out of scope; fixed size.
    pub contracts: u32,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            window_start: "10:00".to_string(),
            window_end: "14:00".to_string(),
            last_entry: "14:30".to_string(),
            midday_cutoff: "12:00".to_string(),
            open_blackout_mins: 30,
            vol_floor: 10.0,
            vol_ceiling: 32.0,
            max_vol_spike: 0.10,
            max_overnight_gap: 0.0075,
            rsi_period: 14,
            rsi_low: 30.0,
            rsi_high: 70.0,
            excluded_weekdays: vec!["fri".to_string()],
            max_slippage_fraction: 0.25,
            max_open_positions: 3,
            contracts: 1,
        }
    }
}

/// Parsed, ready-to-compare entry times.
#[derive(Debug, Clone)]
pub struct EntryTimes {
    pub market_open: NaiveTime,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub last_entry: NaiveTime,
    pub midday_cutoff: NaiveTime,
    pub excluded_weekdays: Vec<Weekday>,
}

impl EntryConfig {
    pub fn resolve(&self) -> Result<EntryTimes> {
        Ok(EntryTimes {
            market_open: parse_time(MARKET_OPEN)?,
            window_start: parse_time(&self.window_start)?,
            window_end: parse_time(&self.window_end)?,
            last_entry: parse_time(&self.last_entry)?,
            midday_cutoff: parse_time(&self.midday_cutoff)?,
            excluded_weekdays: self
                .excluded_weekdays
                .iter()
                .map(|d| parse_weekday(d))
                .collect::<Result<_>>()?,
        })
    }
}

/// One knot of the progressive profit-target schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetKnot {
    pub hours: f64,
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    pub poll_interval_secs: u64,
    /// Authoritative stop-loss fraction of entry credit. The entry cycle
    /// advertises the stop price from this same value.
    pub stop_loss_pct: f64,
    pub emergency_stop_pct: f64,
    pub stop_grace_secs: i64,
    pub trailing_activation: f64,
    pub trailing_giveback: f64,
    pub trailing_tighten: f64,
    pub trailing_step: f64,
    pub trailing_giveback_floor: f64,
    pub target_knots: Vec<TargetKnot>,
    pub hold_profit_pct: f64,
    pub hold_vol_below: f64,
    pub hold_min_tte_hours: f64,
    pub hold_min_entry_distance: Decimal,
    /// Forced close for non-held positions, `HH:MM` Eastern.
    pub eod_close: String,
    pub expiry_time: String,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            stop_loss_pct: 0.25,
            emergency_stop_pct: 0.40,
            stop_grace_secs: 180,
            trailing_activation: 0.40,
            trailing_giveback: 0.15,
            trailing_tighten: 0.03,
            trailing_step: 0.10,
            trailing_giveback_floor: 0.05,
            target_knots: vec![
                TargetKnot {
                    hours: 0.0,
                    pct: 0.50,
                },
                TargetKnot {
                    hours: 2.0,
                    pct: 0.65,
                },
                TargetKnot {
                    hours: 4.0,
                    pct: 0.80,
                },
            ],
            hold_profit_pct: 0.80,
            hold_vol_below: 16.0,
            hold_min_tte_hours: 1.0,
            hold_min_entry_distance: Decimal::from(10),
            eod_close: "15:45".to_string(),
            expiry_time: "16:00".to_string(),
        }
    }
}

/// Parsed exit-machine times.
#[derive(Debug, Clone, Copy)]
pub struct ExitTimes {
    pub eod_close: NaiveTime,
    pub expiry: NaiveTime,
}

impl ExitConfig {
    pub fn resolve(&self) -> Result<ExitTimes> {
        Ok(ExitTimes {
            eod_close: parse_time(&self.eod_close)?,
            expiry: parse_time(&self.expiry_time)?,
        })
    }

    /// The target percentage advertised at entry (schedule at hour zero).
    pub fn initial_target_pct(&self) -> f64 {
        self.target_knots.first().map(|k| k.pct).unwrap_or(0.50)
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("invalid HH:MM time: {s}"))
}

fn parse_weekday(s: &str) -> Result<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        other => anyhow::bail!("invalid weekday: {other}"),
    }
}
