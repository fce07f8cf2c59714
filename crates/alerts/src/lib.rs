//! Outbound chat notifications.
//!
//! Fire-and-forget: sends are spawned, failures are logged at `warn`, and
//! nothing here can fail or block the owning operation.

use std::sync::Arc;

use tracing::{debug, warn};

use gexbot_core::config::AlertsConfig;

#[derive(Clone)]
pub struct Notifier {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    client: reqwest::Client,
    webhook_url: String,
}

impl Notifier {
    /// Build from config. With no webhook URL the notifier is a no-op.
    pub fn new(config: &AlertsConfig) -> Self {
        let inner = config
            .webhook_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| {
                Arc::new(Inner {
                    client: reqwest::Client::new(),
                    webhook_url: url.clone(),
                })
            });
        if inner.is_none() {
            debug!("alerts disabled: no webhook url configured");
        }
        Self { inner }
    }

    /// Disabled notifier for tests and dry runs.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Queue a message. Never blocks, never fails.
    pub fn send(&self, content: impl Into<String>) {
        let Some(inner) = self.inner.clone() else {
            return;
        };
        let content = content.into();
        tokio::spawn(async move {
            let body = serde_json::json!({ "content": content });
            match inner.client.post(&inner.webhook_url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    warn!(status = %resp.status(), "webhook rejected notification")
                }
                Err(err) => warn!(error = %err, "webhook send failed"),
            }
        });
    }
}
