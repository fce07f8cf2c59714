//! Hold-to-expiration qualification.
//!
//! A one-way latch: a position deep in profit, in a calm market, with
//! enough time left and a comfortable entry cushion is left to expire
//! worthless instead of paying to close. Once set it never clears; a held
//! position is touched again only by the emergency stop or settlement.

use rust_decimal::Decimal;

use gexbot_core::config::ExitConfig;

pub fn qualifies_for_hold(
    profit_pct: f64,
    vol: Option<f64>,
    tte_hours: f64,
    entry_distance: Decimal,
    cfg: &ExitConfig,
) -> bool {
    let calm = match vol {
        Some(v) => v < cfg.hold_vol_below,
        // No vol print this tick: cannot qualify, try again next tick.
        None => false,
    };
    profit_pct >= cfg.hold_profit_pct
        && calm
        && tte_hours >= cfg.hold_min_tte_hours
        && entry_distance >= cfg.hold_min_entry_distance
}
