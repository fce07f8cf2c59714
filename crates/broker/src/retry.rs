//! Bounded exponential backoff for transient collaborator failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use gexbot_core::errors::BrokerError;

/// Hard ceiling on any single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Run `f` up to `max_attempts` times, sleeping between attempts.
///
/// Only transient errors are retried; malformed-data and rejection errors
/// return immediately so the caller can skip the cycle. The delay doubles
/// per attempt from `base_delay`, respecting any broker-suggested delay,
/// and never exceeds [`MAX_DELAY`].
pub async fn with_backoff<T, Fut, F>(
    op: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut f: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let backoff = base_delay * 2u32.saturating_pow(attempt);
                let suggested = err
                    .retry_delay_secs()
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);
                let delay = backoff.max(suggested).min(MAX_DELAY);
                warn!(
                    op,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
