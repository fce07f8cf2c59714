//! Trailing-stop lock level.
//!
//! Once armed, the lock-in level rises with the peak profit high-water
//! mark: the allowed giveback shrinks a fixed amount per additional step
//! of peak profit, floored so the lock never overtakes the peak. Because
//! the peak is monotone and the lock is a non-decreasing function of it,
//! the lock itself never loosens.

use gexbot_core::config::ExitConfig;

/// Current lock-in level for a given peak profit percentage.
pub fn lock_level(peak_profit_pct: f64, cfg: &ExitConfig) -> f64 {
    let excess = (peak_profit_pct - cfg.trailing_activation).max(0.0);
    let steps = (excess / cfg.trailing_step).floor();
    let giveback = (cfg.trailing_giveback - steps * cfg.trailing_tighten)
        .max(cfg.trailing_giveback_floor);
    peak_profit_pct - giveback
}

/// Whether the trailing stop fires on this tick.
pub fn trailing_breached(profit_pct: f64, peak_profit_pct: f64, cfg: &ExitConfig) -> bool {
    profit_pct < lock_level(peak_profit_pct, cfg)
}
