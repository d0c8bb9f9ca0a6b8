//! Operator alerts.
//!
//! Alerts mark conditions that need a human: unconfirmed force-exits,
//! repeated exchange failures, kill-switch trips. Delivery is
//! fire-and-forget over a webhook; a failed post must never affect the
//! trading path, so errors are logged and dropped.

use std::time::Duration;

use serde_json::json;
use tracing::{error, warn};

/// Webhook alert sender.
#[derive(Debug, Clone)]
pub struct Alerter {
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl Alerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { webhook_url, http }
    }

    /// Disabled alerter for tests and dry runs without a webhook.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Send an operator alert.
    ///
    /// Always logged at error level; posted to the webhook when one is
    /// configured. Returns immediately; the post runs in the background.
    pub fn send(&self, message: impl Into<String>) {
        let message = message.into();
        error!(alert = %message, "operator alert");

        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let http = self.http.clone();
        tokio::spawn(async move {
            let payload = json!({ "text": message });
            if let Err(e) = http.post(&url).json(&payload).send().await {
                warn!("alert webhook delivery failed: {}", e);
            }
        });
    }
}
