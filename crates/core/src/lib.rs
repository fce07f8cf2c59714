pub mod chain;
pub mod config;
pub mod config_loader;
pub mod errors;
pub mod market;
pub mod position;
pub mod traits;

pub use chain::{ChainSnapshot, OptionQuote, OptionRight, UnderlyingSnapshot, VolSnapshot};
pub use config::{
    AlertsConfig, AppConfig, BrokerConfig, EntryConfig, EntryTimes, ExitConfig, ExitTimes,
    StoreConfig, TargetKnot,
};
pub use config_loader::ConfigLoader;
pub use errors::BrokerError;
pub use market::{round_to_increment, MarketCode, MarketParams, MarketTuning};
pub use position::{Confidence, OpenPosition, SpreadLeg, StrategyKind, TradeSetup};
pub use traits::{FillStatus, MarketData, MultiLegOrder, OrderGateway, OrderLeg, OrderSide};
