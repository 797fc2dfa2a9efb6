//! API response types
//!
//! `TopologyDataResponse` keeps the document shape the topology web page
//! consumes: components grouped by collection, each carrying its switch
//! connections, plus the health colour map.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::actors::{SchedulerStats, TopologyView};
use crate::error::AssemblyWarning;
use crate::model::{Component, ComponentId, ComponentKind, Health, PrivateCloud};
use crate::notify::DispatchStats;
use crate::topology::{Edge, TopologyGraph};

// ============================================================================
// Topology document
// ============================================================================

/// A switch port a component is plugged into
#[derive(Debug, Clone, Serialize)]
pub struct SwitchConnection {
    pub switch_id: ComponentId,
    pub switch_name: String,
    pub port: String,
}

/// Compute, storage or backup component with its switch connections
#[derive(Debug, Clone, Serialize)]
pub struct ComponentEntry {
    #[serde(flatten)]
    pub component: Component,
    pub connected_switches: Vec<SwitchConnection>,
}

/// Switch with its port map (`port -> component id`)
#[derive(Debug, Clone, Serialize)]
pub struct SwitchEntry {
    #[serde(flatten)]
    pub component: Component,
    pub connected_components: BTreeMap<String, ComponentId>,
}

/// GET /api/topology_data
#[derive(Debug, Clone, Serialize)]
pub struct TopologyDataResponse {
    pub private_cloud: Option<PrivateCloud>,
    pub servers: Vec<ComponentEntry>,
    pub storage: Vec<ComponentEntry>,
    pub backup: Vec<ComponentEntry>,
    pub network_switches: Vec<SwitchEntry>,
    pub edges: Vec<Edge>,
    pub health_color_map: BTreeMap<&'static str, &'static str>,
    pub alerted: Vec<ComponentId>,
    pub warnings: Vec<AssemblyWarning>,
    pub cycle: u64,
    pub refreshed_at: String,
}

impl TopologyDataResponse {
    pub fn from_view(view: &TopologyView) -> Self {
        let graph = &view.graph;
        let entries = |kind: ComponentKind| -> Vec<ComponentEntry> {
            graph
                .components_of(kind)
                .map(|component| component_entry(graph, component))
                .collect()
        };

        Self {
            private_cloud: graph.private_cloud().cloned(),
            servers: entries(ComponentKind::Compute),
            storage: entries(ComponentKind::Storage),
            backup: entries(ComponentKind::Backup),
            network_switches: graph
                .components_of(ComponentKind::Switch)
                .map(|switch| switch_entry(graph, switch))
                .collect(),
            edges: graph.edges().to_vec(),
            health_color_map: health_color_map(),
            alerted: view.alerted.clone(),
            warnings: view.warnings.clone(),
            cycle: view.cycle,
            refreshed_at: view.refreshed_at.to_rfc3339(),
        }
    }
}

fn component_entry(graph: &TopologyGraph, component: &Component) -> ComponentEntry {
    let connected_switches = graph
        .neighbours(component.id)
        .iter()
        .filter_map(|adjacency| {
            let peer = graph.node(adjacency.peer_id).filter(|peer| peer.is_switch())?;
            Some(SwitchConnection {
                switch_id: peer.id,
                switch_name: peer.name.clone(),
                port: adjacency.port.clone(),
            })
        })
        .collect();

    ComponentEntry {
        component: component.clone(),
        connected_switches,
    }
}

fn switch_entry(graph: &TopologyGraph, switch: &Component) -> SwitchEntry {
    let mut connected_components = BTreeMap::new();
    for adjacency in graph.neighbours(switch.id) {
        // first component seen on a port keeps it
        connected_components
            .entry(adjacency.port.clone())
            .or_insert(adjacency.peer_id);
    }

    SwitchEntry {
        component: switch.clone(),
        connected_components,
    }
}

pub fn health_color_map() -> BTreeMap<&'static str, &'static str> {
    Health::ALL
        .iter()
        .map(|health| (health.as_str(), health.colour()))
        .collect()
}

// ============================================================================
// Small responses
// ============================================================================

/// GET /api/last_sync_timestamp
#[derive(Debug, Clone, Serialize)]
pub struct LastSyncResponse {
    /// When the latest view was published
    pub last_sync: String,
    pub cycle: u64,
}

impl LastSyncResponse {
    pub fn from_view(view: &TopologyView) -> Self {
        Self {
            last_sync: view.refreshed_at.to_rfc3339(),
            cycle: view.cycle,
        }
    }
}

/// GET /api/v1/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Short description of the latest published view
#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub cycle: u64,
    pub nodes: usize,
    pub edges: usize,
    pub warnings: usize,
    pub refreshed_at: String,
}

impl ViewSummary {
    pub fn from_view(view: &TopologyView) -> Self {
        Self {
            cycle: view.cycle,
            nodes: view.graph.node_count(),
            edges: view.graph.edge_count(),
            warnings: view.warnings.len(),
            refreshed_at: view.refreshed_at.to_rfc3339(),
        }
    }
}

/// GET /api/v1/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub scheduler: SchedulerStats,
    pub notifications: DispatchStats,
    pub notifications_in_flight: usize,
    pub view: Option<ViewSummary>,
}

/// One alerted component
#[derive(Debug, Clone, Serialize)]
pub struct AlertedComponent {
    pub id: ComponentId,

    /// `None` when the component is no longer in the store
    pub name: Option<String>,
    pub kind: Option<ComponentKind>,
}

/// GET /api/v1/alerts
#[derive(Debug, Clone, Serialize)]
pub struct AlertsResponse {
    pub alerted: Vec<AlertedComponent>,
    pub count: usize,
    pub cycle: u64,
}

impl AlertsResponse {
    pub fn from_view(view: &TopologyView) -> Self {
        let alerted: Vec<_> = view
            .alerted
            .iter()
            .map(|&id| {
                let node = view.graph.node(id);
                AlertedComponent {
                    id,
                    name: node.map(|c| c.name.clone()),
                    kind: node.map(|c| c.kind),
                }
            })
            .collect();

        Self {
            count: alerted.len(),
            alerted,
            cycle: view.cycle,
        }
    }
}

/// POST /api/v1/refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
}
