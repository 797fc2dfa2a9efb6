use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use super::{Notification, NotificationTransport, Severity};
use crate::error::DispatchError;

const RED: u32 = 15158332;
const GREEN: u32 = 3066993;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Discord webhook transport
#[derive(Debug, Clone)]
pub struct DiscordTransport {
    client: Client,
    url: String,

    /// User to mention in the message content
    user_id: Option<String>,
}

impl DiscordTransport {
    pub fn new(url: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            user_id,
        }
    }

    pub fn build_embed(notification: &Notification) -> Embed {
        let (title, color) = match notification.severity {
            Severity::Critical => (format!("🔴 {}", notification.subject), RED),
            Severity::Recovered => (format!("✅ {}", notification.subject), GREEN),
        };

        // short values side by side, the connection list on its own line
        let fields = notification
            .fields
            .iter()
            .map(|(name, value)| EmbedField {
                name: name.clone(),
                value: value.clone(),
                inline: value.len() <= 32,
            })
            .collect();

        Embed {
            title: Some(title),
            description: None,
            color: Some(color),
            fields,
            footer: Some(EmbedFooter {
                text: format!("Component {}", notification.component_id),
            }),
            timestamp: Some(notification.timestamp.to_rfc3339()),
        }
    }

    pub fn build_message(&self, notification: &Notification) -> Message {
        let mut builder = MessageBuilder::new().add_embed(Self::build_embed(notification));
        if let Some(user_id) = &self.user_id {
            builder = builder.content(format!("`{}` <@{user_id}>", notification.component_name));
        }
        builder.build()
    }
}

#[async_trait]
impl NotificationTransport for DiscordTransport {
    fn name(&self) -> &'static str {
        "discord"
    }

    #[instrument(skip_all, fields(subject = %notification.subject))]
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        let message = self.build_message(notification);
        let response = self.client.post(&self.url).json(&message).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        info!("successfully sent Discord message");
        Ok(())
    }
}
