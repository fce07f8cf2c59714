//! Broker collaborator: REST implementations of the market-data and order
//! seams, plus a paper shim that fills at the requested price.

pub mod client;
pub mod paper;
pub mod retry;
pub mod symbols;
mod types;

pub use client::RestClient;
pub use paper::PaperGateway;
pub use retry::with_backoff;
