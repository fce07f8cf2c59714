//! Error taxonomy for the broker collaborator boundary.
//!
//! Callers must be able to tell transient network failures (retry with
//! backoff) from malformed data (skip the cycle, never retry).

use thiserror::Error;

/// Errors surfaced by the market-data and order collaborators.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Network-level failure (connect, DNS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its deadline.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// API responded with an error status.
    #[error("API error: {status_code} - {message}")]
    Api { status_code: u16, message: String },

    /// Rate limit hit; retry after the given delay.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Response parsed but the payload is unusable (bad chain, absurd values).
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required datum was absent (no quote for a strike, no vol print).
    #[error("missing data: {0}")]
    MissingData(String),

    /// Order was rejected outright by the broker.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Order id unknown to the broker.
    #[error("order not found: {0}")]
    OrderNotFound(String),
}

impl BrokerError {
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// True for failures worth retrying with backoff. Malformed or missing
    /// data is never transient: the current cycle must be skipped instead.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Suggested delay before the next attempt, when one applies.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::Network(_) | Self::Timeout(_) => Some(1),
            Self::Api { status_code, .. } if *status_code >= 500 => Some(2),
            _ => None,
        }
    }
}
