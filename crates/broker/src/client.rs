//! REST client for the brokerage API, with rate limiting and typed errors.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use gexbot_core::chain::{
    ChainSnapshot, OptionQuote, OptionRight, UnderlyingSnapshot, VolSnapshot,
};
use gexbot_core::config::BrokerConfig;
use gexbot_core::errors::BrokerError;
use gexbot_core::market::MarketCode;
use gexbot_core::traits::{FillStatus, MarketData, MultiLegOrder, OrderGateway, OrderSide};

use crate::symbols::occ_symbol;
use crate::types::{
    ApiErrorBody, ChainResponse, OptionQuotesResponse, OrderAckResponse, OrderStatusResponse,
    QuotesResponse, RawOption, TimesalesResponse,
};

/// Minute bars fetched for the RSI lookback.
const UNDERLYING_BARS: u32 = 30;

/// Minute bars fetched for the vol-spike lookback (five minutes plus now).
const VOL_BARS: u32 = 6;

pub struct RestClient {
    cfg: BrokerConfig,
    http: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl RestClient {
    pub fn new(cfg: BrokerConfig) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| BrokerError::Network(e.to_string()))?;
        let per_minute =
            NonZeroU32::new(cfg.requests_per_minute).unwrap_or(nonzero!(60u32));
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));
        Ok(Self { cfg, http, limiter })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        self.limiter.until_ready().await;
        let url = format!("{}{}", self.cfg.base_url, path);
        debug!(url, "GET");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&self.cfg.api_token)
            .send()
            .await
            .map_err(map_reqwest)?;
        decode(resp).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, BrokerError> {
        self.limiter.until_ready().await;
        let url = format!("{}{}", self.cfg.base_url, path);
        debug!(url, "POST");
        let resp = self
            .http
            .post(&url)
            .form(form)
            .bearer_auth(&self.cfg.api_token)
            .send()
            .await
            .map_err(map_reqwest)?;
        decode(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), BrokerError> {
        self.limiter.until_ready().await;
        let url = format!("{}{}", self.cfg.base_url, path);
        let resp = self
            .http
            .delete(&url)
            .bearer_auth(&self.cfg.api_token)
            .send()
            .await
            .map_err(map_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BrokerError::api(status.as_u16(), status.to_string()))
        }
    }

    async fn recent_closes(&self, symbol: &str, limit: u32) -> Result<Vec<Decimal>, BrokerError> {
        let resp: TimesalesResponse = self
            .get_json(
                "/markets/timesales",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", "1min".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(resp.series.into_iter().map(|bar| bar.close).collect())
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BrokerError> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);
        return Err(BrokerError::RateLimited { retry_after_secs });
    }
    if !status.is_success() {
        let message = resp
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());
        return Err(BrokerError::api(status.as_u16(), message));
    }
    resp.json::<T>()
        .await
        .map_err(|e| BrokerError::Malformed(e.to_string()))
}

fn map_reqwest(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout(err.to_string())
    } else {
        BrokerError::Network(err.to_string())
    }
}

fn map_option(raw: RawOption) -> Result<OptionQuote, BrokerError> {
    let right = match raw.option_type.as_str() {
        "call" => OptionRight::Call,
        "put" => OptionRight::Put,
        other => {
            return Err(BrokerError::Malformed(format!(
                "unknown option type: {other}"
            )))
        }
    };
    Ok(OptionQuote {
        strike: raw.strike,
        right,
        bid: raw.bid,
        ask: raw.ask,
        open_interest: raw.open_interest,
        gamma: raw.greeks.map(|g| g.gamma).unwrap_or(0.0),
    })
}

fn side_param(side: OrderSide) -> &'static str {
    match side {
        OrderSide::SellToOpen => "sell_to_open",
        OrderSide::BuyToOpen => "buy_to_open",
        OrderSide::BuyToClose => "buy_to_close",
        OrderSide::SellToClose => "sell_to_close",
    }
}

fn order_form(order: &MultiLegOrder) -> Vec<(String, String)> {
    let params = order.market.params();
    let order_type = if order.net_price >= Decimal::ZERO {
        "credit"
    } else {
        "debit"
    };
    let mut form = vec![
        ("class".to_string(), "multileg".to_string()),
        ("symbol".to_string(), params.symbol.to_string()),
        ("type".to_string(), order_type.to_string()),
        ("duration".to_string(), "day".to_string()),
        ("price".to_string(), order.net_price.abs().to_string()),
        (
            "all_or_none".to_string(),
            order.all_or_none.to_string(),
        ),
        ("tag".to_string(), order.client_order_id.clone()),
    ];
    for (i, leg) in order.legs.iter().enumerate() {
        form.push((
            format!("option_symbol[{i}]"),
            occ_symbol(params.occ_root, order.expiry, leg.right, leg.strike),
        ));
        form.push((format!("side[{i}]"), side_param(leg.side).to_string()));
        form.push((format!("quantity[{i}]"), leg.quantity.to_string()));
    }
    form
}

#[async_trait]
impl MarketData for RestClient {
    async fn underlying(&self, market: MarketCode) -> Result<UnderlyingSnapshot, BrokerError> {
        let params = market.params();
        let resp: QuotesResponse = self
            .get_json(
                "/markets/quotes",
                &[("symbols", params.symbol.to_string())],
            )
            .await?;
        let quote = resp
            .quotes
            .into_iter()
            .find(|q| q.symbol == params.symbol)
            .ok_or_else(|| BrokerError::MissingData(format!("no quote for {}", params.symbol)))?;
        if quote.last <= Decimal::ZERO {
            return Err(BrokerError::Malformed(format!(
                "non-positive last for {}: {}",
                params.symbol, quote.last
            )));
        }
        let today_open = quote
            .open
            .ok_or_else(|| BrokerError::MissingData(format!("no open for {}", params.symbol)))?;
        let prev_close = quote.prev_close.ok_or_else(|| {
            BrokerError::MissingData(format!("no prev close for {}", params.symbol))
        })?;
        let recent_closes = self.recent_closes(params.symbol, UNDERLYING_BARS).await?;
        Ok(UnderlyingSnapshot {
            symbol: params.symbol.to_string(),
            last: quote.last,
            today_open,
            prev_close,
            recent_closes,
        })
    }

    async fn vol_index(&self, market: MarketCode) -> Result<VolSnapshot, BrokerError> {
        let params = market.params();
        let resp: QuotesResponse = self
            .get_json(
                "/markets/quotes",
                &[("symbols", params.vol_symbol.to_string())],
            )
            .await?;
        let quote = resp
            .quotes
            .into_iter()
            .find(|q| q.symbol == params.vol_symbol)
            .ok_or_else(|| {
                BrokerError::MissingData(format!("no quote for {}", params.vol_symbol))
            })?;
        let value = quote
            .last
            .to_f64()
            .filter(|v| *v > 0.0)
            .ok_or_else(|| {
                BrokerError::Malformed(format!("unusable vol print: {}", quote.last))
            })?;
        let bars = self.recent_closes(params.vol_symbol, VOL_BARS).await?;
        let value_5m_ago = bars.first().and_then(|d| d.to_f64()).filter(|v| *v > 0.0);
        Ok(VolSnapshot {
            symbol: params.vol_symbol.to_string(),
            value,
            value_5m_ago,
        })
    }

    async fn chain(
        &self,
        market: MarketCode,
        expiry: NaiveDate,
    ) -> Result<ChainSnapshot, BrokerError> {
        let params = market.params();
        let resp: ChainResponse = self
            .get_json(
                "/markets/options/chains",
                &[
                    ("symbol", params.symbol.to_string()),
                    ("expiration", expiry.format("%Y-%m-%d").to_string()),
                    ("greeks", "true".to_string()),
                ],
            )
            .await?;
        if resp.spot <= Decimal::ZERO {
            return Err(BrokerError::Malformed(format!(
                "chain spot is {}",
                resp.spot
            )));
        }
        if resp.options.is_empty() {
            return Err(BrokerError::MissingData(format!(
                "empty chain for {} {expiry}",
                params.symbol
            )));
        }
        let quotes = resp
            .options
            .into_iter()
            .map(map_option)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChainSnapshot {
            underlying: resp.underlying,
            spot: resp.spot,
            expiry,
            quotes,
            as_of: chrono::Utc::now(),
        })
    }

    async fn option_quote(
        &self,
        market: MarketCode,
        expiry: NaiveDate,
        strike: Decimal,
        right: OptionRight,
    ) -> Result<OptionQuote, BrokerError> {
        let params = market.params();
        let symbol = occ_symbol(params.occ_root, expiry, right, strike);
        let resp: OptionQuotesResponse = self
            .get_json(
                "/markets/options/quotes",
                &[("symbols", symbol.clone())],
            )
            .await?;
        let raw = resp
            .options
            .into_iter()
            .next()
            .ok_or(BrokerError::MissingData(symbol))?;
        map_option(raw)
    }
}

#[async_trait]
impl OrderGateway for RestClient {
    async fn place_multileg(&self, order: &MultiLegOrder) -> Result<String, BrokerError> {
        let path = format!("/accounts/{}/orders", self.cfg.account_id);
        let resp: OrderAckResponse = self.post_form(&path, &order_form(order)).await?;
        info!(
            order_id = resp.order.id,
            client_order_id = order.client_order_id,
            net_price = %order.net_price,
            legs = order.legs.len(),
            "multileg order placed"
        );
        Ok(resp.order.id)
    }

    async fn fill_status(&self, order_id: &str) -> Result<FillStatus, BrokerError> {
        let path = format!("/accounts/{}/orders/{order_id}", self.cfg.account_id);
        let resp: OrderStatusResponse = self.get_json(&path, &[]).await?;
        let order = resp.order;
        match order.status.as_str() {
            "filled" => {
                let net_price = order.avg_fill_price.ok_or_else(|| {
                    BrokerError::Malformed(format!("filled order {order_id} has no price"))
                })?;
                Ok(FillStatus::Filled { net_price })
            }
            "rejected" => Ok(FillStatus::Rejected {
                reason: order.reason.unwrap_or_else(|| "unspecified".to_string()),
            }),
            "canceled" | "cancelled" | "expired" => Ok(FillStatus::Cancelled),
            "pending" | "open" | "partially_filled" => Ok(FillStatus::Pending),
            other => Err(BrokerError::Malformed(format!(
                "unknown order status: {other}"
            ))),
        }
    }

    async fn cancel(&self, order_id: &str) -> Result<(), BrokerError> {
        let path = format!("/accounts/{}/orders/{order_id}", self.cfg.account_id);
        self.delete(&path).await
    }

    async fn close_position(&self, order: &MultiLegOrder) -> Result<Decimal, BrokerError> {
        let order_id = self.place_multileg(order).await?;
        for _ in 0..self.cfg.fill_poll_attempts {
            tokio::time::sleep(Duration::from_secs(self.cfg.fill_poll_secs)).await;
            match self.fill_status(&order_id).await? {
                FillStatus::Filled { net_price } => return Ok(net_price.abs()),
                FillStatus::Rejected { reason } => {
                    return Err(BrokerError::OrderRejected(reason))
                }
                FillStatus::Cancelled => {
                    return Err(BrokerError::OrderRejected("cancelled".to_string()))
                }
                FillStatus::Pending => {}
            }
        }
        // Give up on this tick: cancel so the next sweep starts clean.
        self.cancel(&order_id).await?;
        Err(BrokerError::Timeout(format!(
            "close order {order_id} not filled in time"
        )))
    }
}
