//! Paper order gateway.
//!
//! Fills every order at its limit price immediately. Lets the entry and
//! exit paths run end to end without a live account.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use gexbot_core::errors::BrokerError;
use gexbot_core::traits::{FillStatus, MultiLegOrder, OrderGateway};

#[derive(Default)]
pub struct PaperGateway {
    orders: Mutex<HashMap<String, FillStatus>>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn place_multileg(&self, order: &MultiLegOrder) -> Result<String, BrokerError> {
        let order_id = format!("PAPER-{}", Uuid::new_v4());
        let fill = FillStatus::Filled {
            net_price: order.net_price,
        };
        self.orders
            .lock()
            .map_err(|_| BrokerError::Network("paper order book poisoned".to_string()))?
            .insert(order_id.clone(), fill);
        info!(
            order_id,
            net_price = %order.net_price,
            legs = order.legs.len(),
            "paper fill simulated"
        );
        Ok(order_id)
    }

    async fn fill_status(&self, order_id: &str) -> Result<FillStatus, BrokerError> {
        self.orders
            .lock()
            .map_err(|_| BrokerError::Network("paper order book poisoned".to_string()))?
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))
    }

    async fn cancel(&self, order_id: &str) -> Result<(), BrokerError> {
        self.orders
            .lock()
            .map_err(|_| BrokerError::Network("paper order book poisoned".to_string()))?
            .insert(order_id.to_string(), FillStatus::Cancelled);
        Ok(())
    }

    async fn close_position(&self, order: &MultiLegOrder) -> Result<Decimal, BrokerError> {
        let order_id = self.place_multileg(order).await?;
        info!(order_id, "paper close filled");
        Ok(order.net_price.abs())
    }
}
