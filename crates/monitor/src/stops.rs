//! Stop-loss rules: graced stop and ungraced emergency stop.

use gexbot_core::config::ExitConfig;

/// Emergency stop: a loss deep enough to bypass the grace period entirely.
pub fn emergency_stop_hit(profit_pct: f64, cfg: &ExitConfig) -> bool {
    profit_pct <= -cfg.emergency_stop_pct
}

/// Regular stop loss. The grace period exists so day-one bid/ask noise
/// right after the fill cannot force an exit.
pub fn stop_loss_hit(profit_pct: f64, age_secs: i64, cfg: &ExitConfig) -> bool {
    profit_pct <= -cfg.stop_loss_pct && age_secs >= cfg.stop_grace_secs
}
