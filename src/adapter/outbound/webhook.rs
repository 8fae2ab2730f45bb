//! Operator alerts over a Slack-compatible incoming webhook.
//!
//! Events are queued to a background worker so the trading path never waits
//! on HTTP. Delivery failures are logged and dropped.

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::port::outbound::notifier::{Event, Notifier, Severity};

/// Webhook notifier settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Events below this severity are not posted.
    pub min_severity: Severity,
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Read the URL from `SLACK_WEBHOOK_URL`. Returns `None` when unset.
    #[must_use]
    pub fn from_env(min_severity: Severity) -> Option<Self> {
        let url = std::env::var("SLACK_WEBHOOK_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        Some(Self {
            url,
            min_severity,
            timeout: Duration::from_secs(5),
        })
    }
}

/// Posts warning-and-above events to a webhook.
pub struct WebhookNotifier {
    sender: mpsc::UnboundedSender<Event>,
    min_severity: Severity,
}

impl WebhookNotifier {
    /// Create the notifier and spawn its delivery worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebhookConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(webhook_worker(client, config.url, receiver));
        Ok(Self {
            sender,
            min_severity: config.min_severity,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: Event) {
        if event.severity() < self.min_severity {
            return;
        }
        if self.sender.send(event).is_err() {
            debug!("Webhook worker gone, dropping event");
        }
    }
}

/// Text posted for an event.
#[must_use]
pub fn format_message(event: &Event) -> String {
    format!(
        "[{}] {} {}",
        event.severity().as_str(),
        event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        event.summary()
    )
}

async fn webhook_worker(
    client: reqwest::Client,
    url: String,
    mut receiver: mpsc::UnboundedReceiver<Event>,
) {
    while let Some(event) = receiver.recv().await {
        let payload = json!({ "text": format_message(&event) });
        match client.post(&url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Webhook rejected alert");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Webhook delivery failed"),
        }
    }
}
