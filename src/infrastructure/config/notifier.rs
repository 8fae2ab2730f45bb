//! Operator notification configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::adapter::outbound::webhook::WebhookConfig;
use crate::port::outbound::notifier::Severity;

/// Operator alert channel.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierAppConfig {
    /// Incoming-webhook URL. `SLACK_WEBHOOK_URL` overrides it.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Lowest severity posted to the webhook.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_min_severity() -> Severity {
    Severity::Warning
}

const fn default_timeout_ms() -> u64 {
    5000
}

impl Default for NotifierAppConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            min_severity: default_min_severity(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl NotifierAppConfig {
    /// Webhook settings, or `None` when no URL is configured.
    #[must_use]
    pub fn webhook(&self) -> Option<WebhookConfig> {
        let url = self.webhook_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(WebhookConfig {
            url: url.to_string(),
            min_severity: self.min_severity,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}
