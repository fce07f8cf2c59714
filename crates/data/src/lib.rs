//! Persistence: the position store file, the advisory run lock, and the
//! append-only trade journal. The store file is the single source of truth
//! for open positions across the entry and monitor processes.

pub mod lock;
pub mod store;
pub mod trade_log;

pub use lock::RunLock;
pub use store::PositionStore;
pub use trade_log::{ClosedTrade, TradeLog};
