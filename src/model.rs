//! Fleet data model
//!
//! Components and connection records as they arrive from the entity store,
//! decoded into strongly typed values. Every refresh cycle decodes a fresh
//! set; nothing here is mutated after decoding.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AssemblyWarning;
use crate::store::Collection;

/// Identity of a component, unique across all component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ComponentId {
    fn from(value: i64) -> Self {
        ComponentId(value)
    }
}

/// Kind of a fleet component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Compute,
    Storage,
    Backup,
    Switch,
}

impl ComponentKind {
    /// All kinds, in assembly order
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Compute,
        ComponentKind::Storage,
        ComponentKind::Backup,
        ComponentKind::Switch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Compute => "compute",
            ComponentKind::Storage => "storage",
            ComponentKind::Backup => "backup",
            ComponentKind::Switch => "switch",
        }
    }

    /// Human readable group label used by renderers
    pub fn group_label(&self) -> &'static str {
        match self {
            ComponentKind::Compute => "Compute Nodes",
            ComponentKind::Storage => "Storage",
            ComponentKind::Backup => "Backup",
            ComponentKind::Switch => "Network",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health reported for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Critical,
    #[default]
    Unknown,
}

impl Health {
    pub const ALL: [Health; 4] = [
        Health::Healthy,
        Health::Degraded,
        Health::Critical,
        Health::Unknown,
    ];

    /// Parse a raw health string; anything unrecognised is `Unknown`
    pub fn parse(raw: &str) -> Health {
        match raw.trim().to_ascii_lowercase().as_str() {
            "healthy" => Health::Healthy,
            "degraded" => Health::Degraded,
            "critical" => Health::Critical,
            _ => Health::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Critical => "critical",
            Health::Unknown => "unknown",
        }
    }

    /// Colour used to draw the component and its links
    pub fn colour(&self) -> &'static str {
        match self {
            Health::Healthy => "green",
            Health::Degraded => "orange",
            Health::Critical => "red",
            Health::Unknown => "gray",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Health::Critical)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fleet component (compute, storage, backup node or switch)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    pub name: String,
    pub health: Health,
    pub power_status: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub mac: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub component_type: Option<String>,
    pub connection_type: Option<String>,
}

impl Component {
    /// Minimal component, mostly useful for tests and fixtures
    pub fn new(id: i64, kind: ComponentKind, name: impl ToString) -> Self {
        Self {
            id: ComponentId(id),
            kind,
            name: name.to_string(),
            health: Health::Unknown,
            power_status: None,
            location: None,
            ip_address: None,
            mac: None,
            role: None,
            component_type: None,
            connection_type: None,
        }
    }

    pub fn with_health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }

    pub fn is_switch(&self) -> bool {
        self.kind == ComponentKind::Switch
    }

    /// Decode a component row of the given kind
    pub fn from_row(kind: ComponentKind, row: &Value) -> Result<Self, serde_json::Error> {
        let row = ComponentRow::deserialize(row)?;

        let location = row.location.or_else(|| {
            row.metadata
                .as_ref()
                .and_then(|m| m.get("location"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        Ok(Self {
            id: row.id,
            kind,
            name: row.name.unwrap_or_else(|| format!("{kind}-{}", row.id)),
            health: row.health.as_deref().map(Health::parse).unwrap_or_default(),
            power_status: row.power_status,
            location,
            ip_address: row.ip_address,
            mac: row.mac,
            role: row.role,
            component_type: row.component_type.or(row.switch_type),
            connection_type: row.connection_type,
        })
    }
}

/// Raw component row as stored in the per-kind entity tables
#[derive(Debug, Deserialize)]
struct ComponentRow {
    id: ComponentId,
    name: Option<String>,
    health: Option<String>,
    power_status: Option<String>,
    location: Option<String>,
    metadata: Option<Value>,
    ip_address: Option<String>,
    mac: Option<String>,
    role: Option<String>,
    #[serde(rename = "type")]
    component_type: Option<String>,
    switch_type: Option<String>,
    connection_type: Option<String>,
}

/// Component-side junction record: a component plugged into a switch port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchLink {
    #[serde(
        alias = "server_id",
        alias = "storage_id",
        alias = "backup_id",
        alias = "local_component_id"
    )]
    pub component_id: ComponentId,
    pub switch_id: ComponentId,
    #[serde(default, deserialize_with = "port_string")]
    pub port: String,
}

/// Switch-centric mapping record: which component sits on a switch port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchPort {
    pub switch_id: ComponentId,
    #[serde(default, deserialize_with = "port_string")]
    pub port: String,
    pub component_id: ComponentId,
}

/// Metadata about the private cloud the fleet belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateCloud {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl PrivateCloud {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Private Cloud")
    }
}

/// Full set of decoded records fetched in one refresh cycle
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub private_cloud: Option<PrivateCloud>,

    /// Components of every kind, in kind order (compute, storage, backup, switch)
    pub components: Vec<Component>,

    /// Component-side junction records, tagged with the table they came from
    pub links: Vec<(Collection, SwitchLink)>,

    /// Switch-centric port mapping records
    pub switch_ports: Vec<SwitchPort>,

    /// Non-fatal problems met while fetching and decoding
    pub warnings: Vec<AssemblyWarning>,

    /// When the fetch finished
    pub fetched_at: DateTime<Utc>,
}

impl EntitySnapshot {
    /// Empty snapshot stamped with the current time
    pub fn empty() -> Self {
        Self {
            private_cloud: None,
            components: Vec::new(),
            links: Vec::new(),
            switch_ports: Vec::new(),
            warnings: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

/// Ports are sometimes stored as numbers, sometimes as strings; null or
/// missing means no port
fn port_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected port as string or number, got {other}"
        ))),
    }
}
