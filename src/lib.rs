//! Fleet topology assembly and health alerting
//!
//! Each refresh cycle fetches the fleet inventory from an entity store,
//! assembles it into a deduplicated undirected graph, raises edge-triggered
//! alerts for components that turned critical and hands the graph to a set
//! of render sinks. Cycles are driven by a timer, by debounced change
//! notifications and by manual requests, and never overlap.

pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod render;
pub mod store;
pub mod topology;
pub mod util;
