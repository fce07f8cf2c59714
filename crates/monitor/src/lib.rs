//! Position exit state machine.
//!
//! A polling loop sweeps every open position each tick, re-prices it, and
//! transitions it through the exit policy: emergency stop, stop loss with
//! grace, trailing stop, progressive profit target, forced end-of-day
//! close, and expiration settlement. Exactly one exit condition may fire
//! per tick, in that priority order. The per-tick decision is a pure
//! function so every rule is testable on synthetic trajectories.

pub mod exit;
pub mod hold;
pub mod pricing;
pub mod service;
pub mod stops;
pub mod targets;
pub mod trailing;
pub mod types;

pub use exit::{apply_tick, TickInput};
pub use service::ExitMonitor;
pub use types::{ExitDecision, ExitReason};
