//! Health alert tracking
//!
//! Edge-triggered alerting on component health. The tracker remembers which
//! components are currently alerted and only emits an event on a transition:
//!
//! ```text
//! health == critical, not alerted  → AlertEvent::Raised   (mark alerted)
//! health == critical, alerted      → nothing
//! health != critical, alerted      → AlertEvent::Cleared  (unmark)
//! health != critical, not alerted  → nothing
//! ```
//!
//! So an unbroken critical episode produces exactly one raised alert, no
//! matter how many refresh cycles observe it.
//!
//! A component that disappears from the graph while alerted stays alerted
//! unless the tracker runs with [`AbsencePolicy::Clear`].
//!
//! The tracker is owned by exactly one refresh cycle at a time; there is no
//! interior mutability and no global state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::model::{Component, ComponentId, ComponentKind, Health, PrivateCloud};
use crate::topology::TopologyGraph;

/// Set of currently alerted components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertState {
    alerted: BTreeSet<ComponentId>,
}

impl AlertState {
    pub fn contains(&self, id: ComponentId) -> bool {
        self.alerted.contains(&id)
    }

    /// Alerted ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.alerted.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.alerted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerted.is_empty()
    }
}

/// What to do with alerted components missing from a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Keep the alert; absence is not evidence of recovery
    #[default]
    Retain,

    /// Clear the alert on the first snapshot the component is missing from
    Clear,
}

/// A peer the alerted component is wired to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedPeer {
    pub id: ComponentId,
    pub name: String,
    pub kind: ComponentKind,
    pub port: String,
}

/// A component just became critical
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaisedAlert {
    /// The component as observed in the triggering snapshot
    pub component: Component,

    /// Everything the component is connected to, with ports
    pub connections: Vec<ConnectedPeer>,

    pub private_cloud: Option<PrivateCloud>,
    pub detected_at: DateTime<Utc>,
}

/// A previously critical component is no longer critical (or gone)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearedAlert {
    pub id: ComponentId,
    pub name: String,
    pub kind: ComponentKind,

    /// Current health, `None` when the component left the snapshot
    pub health: Option<Health>,

    pub cleared_at: DateTime<Utc>,
}

/// Output of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertEvent {
    Raised(RaisedAlert),
    Cleared(ClearedAlert),
}

impl AlertEvent {
    pub fn component_id(&self) -> ComponentId {
        match self {
            AlertEvent::Raised(alert) => alert.component.id,
            AlertEvent::Cleared(alert) => alert.id,
        }
    }

    pub fn is_raised(&self) -> bool {
        matches!(self, AlertEvent::Raised(_))
    }
}

/// Last observation of a component, kept to describe it after it vanishes
#[derive(Debug, Clone)]
struct Observation {
    name: String,
    kind: ComponentKind,
}

/// Edge-triggered health tracker
#[derive(Debug, Clone, Default)]
pub struct HealthAlertTracker {
    state: AlertState,
    observed: BTreeMap<ComponentId, Observation>,
    absence: AbsencePolicy,
}

impl HealthAlertTracker {
    pub fn new(absence: AbsencePolicy) -> Self {
        Self {
            absence,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn absence_policy(&self) -> AbsencePolicy {
        self.absence
    }

    /// Diff the graph's health fields against the alert state
    ///
    /// Events for present components come in id order, followed by clears
    /// for absent components (only under [`AbsencePolicy::Clear`]).
    /// Timestamps come from the graph, so the result depends only on the
    /// current state and the graph.
    #[instrument(skip_all, fields(nodes = graph.node_count(), alerted = self.state.len()))]
    pub fn evaluate(&mut self, graph: &TopologyGraph) -> Vec<AlertEvent> {
        let now = graph.assembled_at();
        let mut events = Vec::new();

        for component in graph.nodes() {
            let id = component.id;

            if component.health.is_critical() {
                if self.state.alerted.insert(id) {
                    debug!("component {id} ({}) became critical", component.name);
                    events.push(AlertEvent::Raised(RaisedAlert {
                        component: component.clone(),
                        connections: connections_of(graph, id),
                        private_cloud: graph.private_cloud().cloned(),
                        detected_at: now,
                    }));
                }
            } else if self.state.alerted.remove(&id) {
                debug!("component {id} ({}) recovered: {}", component.name, component.health);
                events.push(AlertEvent::Cleared(ClearedAlert {
                    id,
                    name: component.name.clone(),
                    kind: component.kind,
                    health: Some(component.health),
                    cleared_at: now,
                }));
            }

            self.observed.insert(
                id,
                Observation {
                    name: component.name.clone(),
                    kind: component.kind,
                },
            );
        }

        if self.absence == AbsencePolicy::Clear {
            let absent: Vec<ComponentId> = self
                .state
                .ids()
                .filter(|id| !graph.contains(*id))
                .collect();

            for id in absent {
                self.state.alerted.remove(&id);
                let Some(observation) = self.observed.get(&id) else {
                    continue;
                };

                debug!("component {id} ({}) vanished, clearing alert", observation.name);
                events.push(AlertEvent::Cleared(ClearedAlert {
                    id,
                    name: observation.name.clone(),
                    kind: observation.kind,
                    health: None,
                    cleared_at: now,
                }));
            }
        }

        self.observed
            .retain(|id, _| graph.contains(*id) || self.state.alerted.contains(id));

        events
    }
}

fn connections_of(graph: &TopologyGraph, id: ComponentId) -> Vec<ConnectedPeer> {
    graph
        .neighbours(id)
        .iter()
        .filter_map(|adjacency| {
            graph.node(adjacency.peer_id).map(|peer| ConnectedPeer {
                id: peer.id,
                name: peer.name.clone(),
                kind: peer.kind,
                port: adjacency.port.clone(),
            })
        })
        .collect()
}
