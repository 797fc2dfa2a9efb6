//! Rendering sinks
//!
//! A sink receives the whole [`TopologyGraph`] after every successful
//! assembly and writes one output document. Sinks are independent: one
//! failing or hanging sink does not keep the others from rendering.
//!
//! - [`DiagramSink`]: static Graphviz DOT diagram
//! - [`InteractiveSink`]: self-refreshing HTML page with the graph embedded

pub mod dot;
pub mod html;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::error::RenderError;
use crate::model::{Component, ComponentKind};
use crate::topology::{Edge, TopologyGraph};

pub use dot::DiagramSink;
pub use html::InteractiveSink;

/// Handle to a document written by a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    pub sink: &'static str,
    pub path: PathBuf,
    pub bytes: usize,
}

#[async_trait]
pub trait RenderSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, graph: &TopologyGraph) -> Result<RenderedDocument, RenderError>;
}

/// Outcome of rendering one sink
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: &'static str,
    pub result: Result<RenderedDocument, RenderError>,
}

/// Render every sink concurrently, each bounded by `timeout`
///
/// Failures are logged here and returned; they never propagate further.
#[instrument(skip_all, fields(sinks = sinks.len()))]
pub async fn render_all(
    sinks: &[Arc<dyn RenderSink>],
    graph: &TopologyGraph,
    timeout: Duration,
) -> Vec<SinkOutcome> {
    let renders = sinks.iter().map(|sink| async move {
        let result = match tokio::time::timeout(timeout, sink.render(graph)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(timeout)),
        };

        match &result {
            Ok(document) => debug!(
                "{} wrote {} bytes to {}",
                sink.name(),
                document.bytes,
                document.path.display()
            ),
            Err(e) => error!("render sink {} failed: {e}", sink.name()),
        }

        SinkOutcome {
            sink: sink.name(),
            result,
        }
    });

    futures::future::join_all(renders).await
}

/// Write `contents` next to `path` and rename it into place
///
/// Readers of `path` see either the previous or the new document, never a
/// partial one.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(())
}

/// Label of an edge: connection type of the non-switch end, then the port
pub(crate) fn edge_label(graph: &TopologyGraph, edge: &Edge) -> String {
    let connection_type = edge_owner(graph, edge)
        .and_then(|c| c.connection_type.as_deref())
        .unwrap_or("unknown");
    format!("{connection_type} ({})", edge.port)
}

/// Colour of an edge: health colour of the non-switch end
pub(crate) fn edge_colour(graph: &TopologyGraph, edge: &Edge) -> &'static str {
    edge_owner(graph, edge)
        .map(|c| c.health.colour())
        .unwrap_or("gray")
}

/// The endpoint that "owns" an edge: the non-switch one, or `a` for uplinks
fn edge_owner<'g>(graph: &'g TopologyGraph, edge: &Edge) -> Option<&'g Component> {
    let a = graph.node(edge.a)?;
    let b = graph.node(edge.b)?;

    Some(match (a.kind, b.kind) {
        (ComponentKind::Switch, ComponentKind::Switch) => a,
        (ComponentKind::Switch, _) => b,
        _ => a,
    })
}
