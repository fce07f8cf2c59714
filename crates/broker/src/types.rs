//! Raw wire types for the broker's REST API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct QuotesResponse {
    pub quotes: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuote {
    pub symbol: String,
    pub last: Decimal,
    #[serde(default)]
    pub open: Option<Decimal>,
    #[serde(default)]
    pub prev_close: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimesalesResponse {
    pub series: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBar {
    #[allow(dead_code)]
    pub time: DateTime<Utc>,
    pub close: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChainResponse {
    pub underlying: String,
    pub spot: Decimal,
    pub options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOption {
    pub strike: Decimal,
    pub option_type: String,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(default)]
    pub greeks: Option<RawGreeks>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGreeks {
    #[serde(default)]
    pub gamma: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptionQuotesResponse {
    pub options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderAckResponse {
    pub order: RawOrderAck,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrderAck {
    pub id: String,
    #[allow(dead_code)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderStatusResponse {
    pub order: RawOrderStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrderStatus {
    #[allow(dead_code)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub avg_fill_price: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
