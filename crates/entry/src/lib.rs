//! Entry evaluator.
//!
//! One invocation runs one full evaluation cycle: gate battery, peak
//! extraction, strike selection, credit math, all-or-none order placement,
//! and persistence of the resulting open position. Triggered externally at
//! fixed clock times; performs no scheduling of its own.

pub mod credit;
pub mod evaluator;
pub mod gates;
pub mod rsi;

pub use evaluator::{CycleOutcome, EntryEvaluator};
pub use gates::GateDecision;
