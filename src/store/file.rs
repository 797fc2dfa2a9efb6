//! File-based entity store
//!
//! Reads one JSON document whose top-level keys are collection names:
//!
//! ```json
//! {
//!   "private_cloud": { "name": "Lab", "last_sync": "..." },
//!   "servers": [ { "id": 1, "name": "kvm-1", "health": "healthy",
//!                  "connected_switches": [ { "switch_id": 9, "port": "eth0" } ] } ],
//!   "network_switches": [ { "id": 9, "name": "tor-1",
//!                           "connected_components": { "ge-0/0/1": 1 } } ],
//!   "storage": [], "backup": []
//! }
//! ```
//!
//! Junction collections may be given as their own top-level arrays, or be
//! embedded in the component rows (`connected_switches` lists on
//! components, `connected_components` port maps on switches). Embedded
//! records are flattened into junction rows on read.
//!
//! The file is re-read on every fetch, so edits are picked up by the next
//! refresh cycle.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{instrument, trace};

use super::{Collection, EntityStore};
use crate::error::FetchError;

/// Entity store backed by a single JSON document on disk
#[derive(Debug, Clone)]
pub struct FileEntityStore {
    path: PathBuf,
}

impl FileEntityStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EntityStore for FileEntityStore {
    fn describe(&self) -> String {
        format!("file: {}", self.path.display())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let document: Value = serde_json::from_str(&content)?;

        extract_collection(&document, collection)
    }
}

/// Pull one collection out of a whole-fleet document
fn extract_collection(document: &Value, collection: Collection) -> Result<Vec<Value>, FetchError> {
    match document.get(collection.table_name()) {
        Some(Value::Array(rows)) => Ok(rows.clone()),
        Some(Value::Object(row)) if collection == Collection::PrivateCloud => {
            Ok(vec![Value::Object(row.clone())])
        }
        Some(other) => Err(FetchError::Decode(format!(
            "`{collection}` must be an array, got {other}"
        ))),
        None => {
            let Some(owner) = collection.junction_owner() else {
                return Err(FetchError::MissingCollection(
                    collection.table_name().to_string(),
                ));
            };

            trace!("deriving {collection} from rows embedded in {owner}");
            let rows = document
                .get(owner.table_name())
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            Ok(if collection == Collection::NetworkConnectedComponents {
                embedded_switch_ports(rows)
            } else {
                embedded_links(rows)
            })
        }
    }
}

/// Flatten `connected_switches` lists into junction rows
fn embedded_links(rows: &[Value]) -> Vec<Value> {
    rows.iter()
        .flat_map(|row| {
            let component_id = row.get("id").cloned().unwrap_or(Value::Null);
            row.get("connected_switches")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(move |conn| {
                    json!({
                        "component_id": component_id,
                        "switch_id": conn.get("switch_id"),
                        "port": conn.get("port"),
                    })
                })
        })
        .collect()
}

/// Flatten `connected_components` port maps into switch-centric rows
fn embedded_switch_ports(rows: &[Value]) -> Vec<Value> {
    rows.iter()
        .flat_map(|row| {
            let switch_id = row.get("id").cloned().unwrap_or(Value::Null);
            row.get("connected_components")
                .and_then(Value::as_object)
                .into_iter()
                .flatten()
                .map(move |(port, component_id)| {
                    json!({
                        "switch_id": switch_id,
                        "port": port,
                        "component_id": component_id,
                    })
                })
        })
        .collect()
}
