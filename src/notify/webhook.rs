use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use super::{Notification, NotificationTransport};
use crate::error::DispatchError;

/// Generic JSON webhook
///
/// Posts `{subject, message, component_id, severity, timestamp}`.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    fn name(&self) -> &'static str {
        "webhook"
    }

    #[instrument(skip_all, fields(subject = %notification.subject))]
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        let payload = json!({
            "subject": notification.subject,
            "message": notification.body,
            "component_id": notification.component_id,
            "severity": notification.severity,
            "timestamp": notification.timestamp.to_rfc3339()
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        info!("successfully sent webhook alert");
        Ok(())
    }
}
