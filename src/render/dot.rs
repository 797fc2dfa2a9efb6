use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::instrument;

use super::{RenderSink, RenderedDocument, edge_colour, edge_label, write_atomically};
use crate::error::RenderError;
use crate::model::ComponentKind;
use crate::topology::TopologyGraph;

/// Static diagram in Graphviz DOT format, one cluster per component kind
#[derive(Debug, Clone)]
pub struct DiagramSink {
    path: PathBuf,
}

impl DiagramSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn to_dot(graph: &TopologyGraph) -> Result<String, RenderError> {
        let mut out = String::new();
        Self::write_dot(graph, &mut out).map_err(|e| RenderError::Format(e.to_string()))?;
        Ok(out)
    }

    fn write_dot(graph: &TopologyGraph, out: &mut String) -> std::fmt::Result {
        let title = graph
            .private_cloud()
            .map(|cloud| format!("{} Topology", cloud.display_name()))
            .unwrap_or_else(|| "Fleet Topology".to_string());

        writeln!(out, "graph topology {{")?;
        writeln!(
            out,
            "  graph [label=\"{}\", labelloc=t, fontsize=20, rankdir=LR];",
            escape(&title)
        )?;
        writeln!(out, "  node [shape=box, style=\"rounded,filled\", fontcolor=white];")?;

        for kind in ComponentKind::ALL {
            let mut members = graph.components_of(kind).peekable();
            if members.peek().is_none() {
                continue;
            }

            writeln!(out, "  subgraph cluster_{} {{", kind.as_str())?;
            writeln!(out, "    label=\"{}\";", kind.group_label())?;
            for component in members {
                let mut label = component.name.clone();
                if let Some(ip) = &component.ip_address {
                    label.push('\n');
                    label.push_str(ip);
                }
                writeln!(
                    out,
                    "    n{} [label=\"{}\", fillcolor=\"{}\"];",
                    component.id,
                    escape(&label),
                    component.health.colour()
                )?;
            }
            writeln!(out, "  }}")?;
        }

        for edge in graph.edges() {
            writeln!(
                out,
                "  n{} -- n{} [label=\"{}\", color=\"{}\"];",
                edge.a,
                edge.b,
                escape(&edge_label(graph, edge)),
                edge_colour(graph, edge)
            )?;
        }

        writeln!(out, "}}")
    }
}

#[async_trait]
impl RenderSink for DiagramSink {
    fn name(&self) -> &'static str {
        "diagram"
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn render(&self, graph: &TopologyGraph) -> Result<RenderedDocument, RenderError> {
        let dot = Self::to_dot(graph)?;
        write_atomically(&self.path, dot.as_bytes()).await?;

        Ok(RenderedDocument {
            sink: self.name(),
            path: self.path.clone(),
            bytes: dot.len(),
        })
    }
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
