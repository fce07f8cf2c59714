//! GEX peak engine.
//!
//! Computes signed gamma exposure per strike from an options chain
//! snapshot, scores strikes by proximity-weighted exposure, and detects
//! competing peaks straddling the current price. Pure functions of the
//! snapshot — no I/O, nothing persisted.

pub mod peaks;

pub use peaks::{rank_peaks, CompetingPeaks, GexPeak, PeakAnalysis};
