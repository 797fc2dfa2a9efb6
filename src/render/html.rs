use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use super::{RenderSink, RenderedDocument, edge_colour, edge_label, write_atomically};
use crate::error::RenderError;
use crate::topology::TopologyGraph;

/// Self-contained HTML page that re-renders itself every few seconds
#[derive(Debug, Clone)]
pub struct InteractiveSink {
    path: PathBuf,
    refresh_secs: u64,
}

#[derive(Serialize)]
struct PageNode<'g> {
    id: i64,
    name: &'g str,
    kind: &'static str,
    group: &'static str,
    health: &'static str,
    color: &'static str,
    ip_address: Option<&'g str>,
    location: Option<&'g str>,
}

#[derive(Serialize)]
struct PageEdge {
    source: i64,
    target: i64,
    port: String,
    label: String,
    color: &'static str,
}

#[derive(Serialize)]
struct PageGraph<'g> {
    title: String,
    generated_at: String,
    nodes: Vec<PageNode<'g>>,
    edges: Vec<PageEdge>,
}

impl InteractiveSink {
    pub fn new(path: impl Into<PathBuf>, refresh_secs: u64) -> Self {
        Self {
            path: path.into(),
            refresh_secs,
        }
    }

    pub fn to_html(&self, graph: &TopologyGraph) -> Result<String, RenderError> {
        let page = PageGraph {
            title: graph
                .private_cloud()
                .map(|cloud| format!("{} Topology", cloud.display_name()))
                .unwrap_or_else(|| "Fleet Topology".to_string()),
            generated_at: graph.assembled_at().to_rfc3339(),
            nodes: graph
                .nodes()
                .map(|c| PageNode {
                    id: c.id.0,
                    name: &c.name,
                    kind: c.kind.as_str(),
                    group: c.kind.group_label(),
                    health: c.health.as_str(),
                    color: c.health.colour(),
                    ip_address: c.ip_address.as_deref(),
                    location: c.location.as_deref(),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|e| PageEdge {
                    source: e.a.0,
                    target: e.b.0,
                    port: e.port.clone(),
                    label: edge_label(graph, e),
                    color: edge_colour(graph, e),
                })
                .collect(),
        };

        // `</` inside a script block would end it early
        let data = serde_json::to_string(&page)?.replace("</", "<\\/");
        let title = html_escape(&page.title);

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 0; }}
header {{ padding: 8px 16px; background: #222; color: #eee; }}
#graph {{ width: 100vw; height: calc(100vh - 48px); }}
</style>
</head>
<body>
<header>{title} &middot; <span id="generated"></span></header>
<svg id="graph"></svg>
<script id="topology-data" type="application/json">{data}</script>
<script>
const topology = JSON.parse(document.getElementById("topology-data").textContent);
document.getElementById("generated").textContent = topology.generated_at;
const svg = document.getElementById("graph");
const groups = [...new Set(topology.nodes.map(n => n.group))];
const pos = {{}};
groups.forEach((g, gi) => {{
  topology.nodes.filter(n => n.group === g).forEach((n, i) => {{
    pos[n.id] = {{ x: 120 + gi * 260, y: 60 + i * 70 }};
  }});
}});
const ns = "http://www.w3.org/2000/svg";
for (const e of topology.edges) {{
  const line = document.createElementNS(ns, "line");
  line.setAttribute("x1", pos[e.source].x); line.setAttribute("y1", pos[e.source].y);
  line.setAttribute("x2", pos[e.target].x); line.setAttribute("y2", pos[e.target].y);
  line.setAttribute("stroke", e.color);
  const title = document.createElementNS(ns, "title"); title.textContent = e.label;
  line.appendChild(title); svg.appendChild(line);
}}
for (const n of topology.nodes) {{
  const c = document.createElementNS(ns, "circle");
  c.setAttribute("cx", pos[n.id].x); c.setAttribute("cy", pos[n.id].y);
  c.setAttribute("r", 14); c.setAttribute("fill", n.color);
  const title = document.createElementNS(ns, "title");
  title.textContent = `${{n.name}} (${{n.kind}}, ${{n.health}})`;
  c.appendChild(title); svg.appendChild(c);
  const t = document.createElementNS(ns, "text");
  t.setAttribute("x", pos[n.id].x + 18); t.setAttribute("y", pos[n.id].y + 4);
  t.textContent = n.name; svg.appendChild(t);
}}
</script>
</body>
</html>
"#,
            refresh = self.refresh_secs,
        ))
    }
}

#[async_trait]
impl RenderSink for InteractiveSink {
    fn name(&self) -> &'static str {
        "interactive"
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn render(&self, graph: &TopologyGraph) -> Result<RenderedDocument, RenderError> {
        let html = self.to_html(graph)?;
        write_atomically(&self.path, html.as_bytes()).await?;

        Ok(RenderedDocument {
            sink: self.name(),
            path: self.path.clone(),
            bytes: html.len(),
        })
    }
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
