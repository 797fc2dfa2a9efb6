//! Human-readable alert messages
//!
//! A [`Notification`] is built once per [`AlertEvent`] and handed to the
//! transport as is. It carries a plain-text subject and body (for mail-like
//! relays and generic webhooks) plus structured fields (for Discord embeds).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::{AlertEvent, ClearedAlert, RaisedAlert};
use crate::model::ComponentId;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Recovered,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Recovered => "recovered",
        }
    }
}

/// Fully rendered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub component_id: ComponentId,
    pub component_name: String,

    /// Label/value pairs describing the component
    pub fields: Vec<(String, String)>,

    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &AlertEvent) -> Self {
        match event {
            AlertEvent::Raised(alert) => Self::raised(alert),
            AlertEvent::Cleared(alert) => Self::cleared(alert),
        }
    }

    fn raised(alert: &RaisedAlert) -> Self {
        let component = &alert.component;
        let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_AVAILABLE.into());

        let connections = if alert.connections.is_empty() {
            "None".to_string()
        } else {
            alert
                .connections
                .iter()
                .map(|peer| format!("{} (id {}) port {}", peer.name, peer.id, peer.port))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let fields = vec![
            ("Name".to_string(), component.name.clone()),
            ("ID".to_string(), component.id.to_string()),
            ("Kind".to_string(), component.kind.to_string()),
            ("Type".to_string(), or_na(&component.component_type)),
            ("Role".to_string(), or_na(&component.role)),
            ("Health Status".to_string(), "CRITICAL".to_string()),
            ("Power Status".to_string(), or_na(&component.power_status)),
            ("MAC".to_string(), or_na(&component.mac)),
            ("IP Address".to_string(), or_na(&component.ip_address)),
            ("Location".to_string(), or_na(&component.location)),
            ("Connected To".to_string(), connections),
        ];

        let (cloud_name, last_sync) = match &alert.private_cloud {
            Some(cloud) => (
                cloud.display_name().to_string(),
                cloud.last_sync.clone().unwrap_or_else(|| NOT_AVAILABLE.into()),
            ),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };

        let mut body = format!(
            "Critical Component Alert\n\n\
             Time of Detection: {}\n\
             Private Cloud: {cloud_name}\n\
             Last Sync: {last_sync}\n\n\
             Component Details:\n",
            alert.detected_at.format("%Y-%m-%d %H:%M:%S")
        );
        for (label, value) in &fields {
            body.push_str(&format!("- {label}: {value}\n"));
        }
        body.push_str("\nThis is an automated alert from the topology monitor.\n");

        Self {
            subject: format!("Critical Alert: {}", component.name),
            body,
            severity: Severity::Critical,
            component_id: component.id,
            component_name: component.name.clone(),
            fields,
            timestamp: alert.detected_at,
        }
    }

    fn cleared(alert: &ClearedAlert) -> Self {
        let health = alert
            .health
            .map(|h| h.as_str().to_uppercase())
            .unwrap_or_else(|| "REMOVED".to_string());

        let fields = vec![
            ("Name".to_string(), alert.name.clone()),
            ("ID".to_string(), alert.id.to_string()),
            ("Kind".to_string(), alert.kind.to_string()),
            ("Health Status".to_string(), health.clone()),
        ];

        let body = format!(
            "Component {} (id {}) is no longer critical.\n\
             Current health: {health}\n\
             Time: {}\n",
            alert.name,
            alert.id,
            alert.cleared_at.format("%Y-%m-%d %H:%M:%S")
        );

        Self {
            subject: format!("Recovered: {}", alert.name),
            body,
            severity: Severity::Recovered,
            component_id: alert.id,
            component_name: alert.name.clone(),
            fields,
            timestamp: alert.cleared_at,
        }
    }
}
