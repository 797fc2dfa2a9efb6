//! Topology assembly
//!
//! Joins the flat component and junction collections of an
//! [`EntitySnapshot`] into a [`TopologyGraph`]. A graph is built from
//! scratch every refresh cycle and never mutated afterwards; consumers
//! receive it whole.
//!
//! ## Rules
//!
//! - Node set is exactly the set of fetched components (first occurrence of
//!   an id wins, in kind order compute, storage, backup, switch).
//! - A connection is kept only if both endpoints are nodes and the switch
//!   side really is a switch. Anything else becomes an [`AssemblyWarning`].
//! - Connections are undirected: A-B recorded from both sides yields one
//!   edge, keyed by `(min(A, B), max(A, B))`. The first port seen wins
//!   (component-side junctions before the switch-centric map).

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::AssemblyWarning;
use crate::model::{Component, ComponentId, ComponentKind, EntitySnapshot, PrivateCloud};
use crate::store::Collection;

/// One entry of a node's adjacency list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjacency {
    pub peer_id: ComponentId,
    pub port: String,
}

/// Undirected edge, normalised so that `a < b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub a: ComponentId,
    pub b: ComponentId,
    pub port: String,
}

impl Edge {
    /// The endpoint opposite to `id`, if `id` is an endpoint at all
    pub fn other(&self, id: ComponentId) -> Option<ComponentId> {
        if id == self.a {
            Some(self.b)
        } else if id == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Immutable fleet graph produced by one refresh cycle
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    nodes: BTreeMap<ComponentId, Component>,
    adjacency: BTreeMap<ComponentId, Vec<Adjacency>>,
    edges: Vec<Edge>,
    private_cloud: Option<PrivateCloud>,
    assembled_at: DateTime<Utc>,
}

impl TopologyGraph {
    /// Components in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Component> {
        self.nodes.values()
    }

    pub fn node(&self, id: ComponentId) -> Option<&Component> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Adjacency list of `id`, in insertion order; empty for unknown ids
    pub fn neighbours(&self, id: ComponentId) -> &[Adjacency] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edge between two components, whichever order they are given in
    pub fn edge_between(&self, a: ComponentId, b: ComponentId) -> Option<&Edge> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.edges.iter().find(|edge| edge.a == a && edge.b == b)
    }

    /// Components of one kind, in id order
    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.nodes.values().filter(move |c| c.kind == kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn private_cloud(&self) -> Option<&PrivateCloud> {
        self.private_cloud.as_ref()
    }

    /// Fetch time of the snapshot this graph was built from
    pub fn assembled_at(&self) -> DateTime<Utc> {
        self.assembled_at
    }
}

/// Result of assembling a snapshot
#[derive(Debug, Clone)]
pub struct Assembly {
    pub graph: TopologyGraph,

    /// Snapshot warnings followed by assembly warnings
    pub warnings: Vec<AssemblyWarning>,
}

/// Incremental builder used by [`assemble`]
struct GraphBuilder {
    nodes: BTreeMap<ComponentId, Component>,
    adjacency: BTreeMap<ComponentId, Vec<Adjacency>>,
    edges: Vec<Edge>,
    seen_pairs: HashSet<(ComponentId, ComponentId)>,
    warnings: Vec<AssemblyWarning>,
}

impl GraphBuilder {
    fn add_component(&mut self, component: &Component) {
        if self.nodes.contains_key(&component.id) {
            warn!(
                "duplicate component id {} ({}), keeping first occurrence",
                component.id, component.kind
            );
            self.warnings.push(AssemblyWarning::DuplicateComponent {
                id: component.id,
                kind: component.kind,
            });
            return;
        }

        self.adjacency.insert(component.id, Vec::new());
        self.nodes.insert(component.id, component.clone());
    }

    /// Validate and add one component-to-switch connection
    fn connect(
        &mut self,
        collection: Collection,
        component_id: ComponentId,
        switch_id: ComponentId,
        port: &str,
    ) {
        if !self.nodes.contains_key(&component_id) {
            debug!("{collection}: dropping connection of unknown component {component_id}");
            self.warnings.push(AssemblyWarning::DanglingComponent {
                collection,
                component_id,
            });
            return;
        }

        if !self.nodes.get(&switch_id).is_some_and(Component::is_switch) {
            debug!("{collection}: dropping connection to unknown switch {switch_id}");
            self.warnings.push(AssemblyWarning::DanglingSwitch {
                collection,
                switch_id,
            });
            return;
        }

        if component_id == switch_id {
            self.warnings.push(AssemblyWarning::SelfLoop {
                switch_id,
                port: port.to_string(),
            });
            return;
        }

        let pair = if component_id < switch_id {
            (component_id, switch_id)
        } else {
            (switch_id, component_id)
        };

        if !self.seen_pairs.insert(pair) {
            return;
        }

        for (from, to) in [(component_id, switch_id), (switch_id, component_id)] {
            self.adjacency.entry(from).or_default().push(Adjacency {
                peer_id: to,
                port: port.to_string(),
            });
        }

        self.edges.push(Edge {
            a: pair.0,
            b: pair.1,
            port: port.to_string(),
        });
    }
}

/// Build a topology graph from a snapshot
///
/// Never fails: problems with individual records are reported as warnings
/// and the affected records are left out of the graph.
#[instrument(skip_all, fields(components = snapshot.components.len()))]
pub fn assemble(snapshot: &EntitySnapshot) -> Assembly {
    let mut builder = GraphBuilder {
        nodes: BTreeMap::new(),
        adjacency: BTreeMap::new(),
        edges: Vec::new(),
        seen_pairs: HashSet::new(),
        warnings: snapshot.warnings.clone(),
    };

    for component in &snapshot.components {
        builder.add_component(component);
    }

    for (collection, link) in &snapshot.links {
        builder.connect(*collection, link.component_id, link.switch_id, &link.port);
    }

    for record in &snapshot.switch_ports {
        builder.connect(
            Collection::NetworkConnectedComponents,
            record.component_id,
            record.switch_id,
            &record.port,
        );
    }

    debug!(
        "assembled {} nodes, {} edges, {} warnings",
        builder.nodes.len(),
        builder.edges.len(),
        builder.warnings.len()
    );

    Assembly {
        graph: TopologyGraph {
            nodes: builder.nodes,
            adjacency: builder.adjacency,
            edges: builder.edges,
            private_cloud: snapshot.private_cloud.clone(),
            assembled_at: snapshot.fetched_at,
        },
        warnings: builder.warnings,
    }
}
