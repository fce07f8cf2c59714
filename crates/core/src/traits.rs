//! Trait seams for the external collaborators.
//!
//! The entry evaluator and exit monitor are written against these traits;
//! the broker crate provides the REST implementations and a paper shim.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainSnapshot, OptionQuote, OptionRight, UnderlyingSnapshot, VolSnapshot};
use crate::errors::BrokerError;
use crate::market::MarketCode;

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn underlying(&self, market: MarketCode) -> Result<UnderlyingSnapshot, BrokerError>;

    async fn vol_index(&self, market: MarketCode) -> Result<VolSnapshot, BrokerError>;

    async fn chain(
        &self,
        market: MarketCode,
        expiry: NaiveDate,
    ) -> Result<ChainSnapshot, BrokerError>;

    /// Current quote for a single contract. Used by the monitor to re-price
    /// open legs each tick.
    async fn option_quote(
        &self,
        market: MarketCode,
        expiry: NaiveDate,
        strike: Decimal,
        right: OptionRight,
    ) -> Result<OptionQuote, BrokerError>;
}

/// Which way a leg opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    SellToOpen,
    BuyToOpen,
    BuyToClose,
    SellToClose,
}

/// One leg of a multi-leg order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLeg {
    pub right: OptionRight,
    pub strike: Decimal,
    pub side: OrderSide,
    pub quantity: u32,
}

/// A multi-leg net-credit (or net-debit) order.
///
/// `all_or_none` must be true for every opening order: a partial fill
/// leaves a naked short leg with unbounded risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLegOrder {
    pub market: MarketCode,
    pub expiry: NaiveDate,
    pub legs: Vec<OrderLeg>,
    /// Net limit price: positive = credit received, negative = debit paid.
    pub net_price: Decimal,
    pub all_or_none: bool,
    pub client_order_id: String,
}

/// Fill state of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FillStatus {
    Pending,
    Filled { net_price: Decimal },
    Rejected { reason: String },
    Cancelled,
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a multi-leg order; returns the broker order id.
    async fn place_multileg(&self, order: &MultiLegOrder) -> Result<String, BrokerError>;

    async fn fill_status(&self, order_id: &str) -> Result<FillStatus, BrokerError>;

    async fn cancel(&self, order_id: &str) -> Result<(), BrokerError>;

    /// Close an open spread at the given net debit; returns the fill price.
    async fn close_position(
        &self,
        order: &MultiLegOrder,
    ) -> Result<Decimal, BrokerError>;
}
