//! Entity store clients
//!
//! The entity store holds the fleet inventory as flat, normalized tables:
//! one table per component kind, one junction table per kind linking
//! components to switch ports, and a switch-centric port map.
//!
//! ## Backends
//!
//! - **REST** (`rest`): PostgREST-style HTTP API (`GET /rest/v1/{table}`)
//! - **File** (`file`): one JSON document holding every collection
//! - **Memory** (`memory`): in-process tables, for tests and demos
//!
//! Collections are fetched independently; there is no cross-table
//! transaction, so a snapshot may mix tables read at slightly different
//! instants. [`fetch_snapshot`] tolerates that.

pub mod file;
pub mod memory;
pub mod rest;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::StoreConfig;
use crate::error::{AssemblyError, AssemblyWarning, FetchError};
use crate::model::{
    Component, ComponentKind, EntitySnapshot, PrivateCloud, SwitchLink, SwitchPort,
};
use crate::util;

pub use file::FileEntityStore;
pub use memory::MemoryEntityStore;
pub use rest::RestEntityStore;

/// Named collection (table) in the entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Servers,
    Storage,
    Backup,
    NetworkSwitches,
    ServerConnectedSwitches,
    StorageConnectedSwitches,
    BackupConnectedSwitches,
    NetworkConnectedComponents,
    PrivateCloud,
}

impl Collection {
    /// Every collection a snapshot is built from
    pub const ALL: [Collection; 9] = [
        Collection::Servers,
        Collection::Storage,
        Collection::Backup,
        Collection::NetworkSwitches,
        Collection::ServerConnectedSwitches,
        Collection::StorageConnectedSwitches,
        Collection::BackupConnectedSwitches,
        Collection::NetworkConnectedComponents,
        Collection::PrivateCloud,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Servers => "servers",
            Collection::Storage => "storage",
            Collection::Backup => "backup",
            Collection::NetworkSwitches => "network_switches",
            Collection::ServerConnectedSwitches => "server_connected_switches",
            Collection::StorageConnectedSwitches => "storage_connected_switches",
            Collection::BackupConnectedSwitches => "backup_connected_switches",
            Collection::NetworkConnectedComponents => "network_connected_components",
            Collection::PrivateCloud => "private_cloud",
        }
    }

    /// Component collection holding components of `kind`
    pub fn for_kind(kind: ComponentKind) -> Collection {
        match kind {
            ComponentKind::Compute => Collection::Servers,
            ComponentKind::Storage => Collection::Storage,
            ComponentKind::Backup => Collection::Backup,
            ComponentKind::Switch => Collection::NetworkSwitches,
        }
    }

    /// Kind of the components stored in this collection, if it is a component collection
    pub fn component_kind(&self) -> Option<ComponentKind> {
        match self {
            Collection::Servers => Some(ComponentKind::Compute),
            Collection::Storage => Some(ComponentKind::Storage),
            Collection::Backup => Some(ComponentKind::Backup),
            Collection::NetworkSwitches => Some(ComponentKind::Switch),
            _ => None,
        }
    }

    /// Component collection a junction collection hangs off
    pub fn junction_owner(&self) -> Option<Collection> {
        match self {
            Collection::ServerConnectedSwitches => Some(Collection::Servers),
            Collection::StorageConnectedSwitches => Some(Collection::Storage),
            Collection::BackupConnectedSwitches => Some(Collection::Backup),
            Collection::NetworkConnectedComponents => Some(Collection::NetworkSwitches),
            _ => None,
        }
    }

    /// Component collections are required; a cycle cannot proceed without them
    pub fn is_required(&self) -> bool {
        self.component_kind().is_some()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Client for the external entity store
///
/// Implementations execute one request per call: no pagination state, no
/// retries, no transactions. Bounding the call duration is the caller's job.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Short description for logs (e.g. the base URL or file path)
    fn describe(&self) -> String;

    /// Fetch every record of a collection, in store order
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, FetchError>;
}

/// Build the configured store client
///
/// REST settings left out of the configuration fall back to the
/// `SUPABASE_URL` and `SUPABASE_KEY` environment variables.
pub fn store_from_config(config: &StoreConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    match config {
        StoreConfig::Rest { url, api_key } => {
            let url = url
                .clone()
                .or_else(util::get_store_url)
                .context("no entity store URL configured (set store.url or SUPABASE_URL)")?;
            let api_key = api_key.clone().or_else(util::get_store_key);
            if api_key.is_none() {
                warn!("no API key configured for {url}, requests are unauthenticated");
            }

            Ok(Arc::new(RestEntityStore::new(url, api_key)))
        }
        StoreConfig::File { path } => Ok(Arc::new(FileEntityStore::new(path))),
    }
}

/// Fetch every collection and decode it into an [`EntitySnapshot`]
///
/// Each collection fetch is bounded by `timeout`. A failing component
/// collection aborts with [`AssemblyError`]; a failing junction or metadata
/// collection, or an undecodable row, only adds a warning.
#[instrument(skip(store), fields(store = %store.describe()))]
pub async fn fetch_snapshot(
    store: &dyn EntityStore,
    timeout: Duration,
) -> Result<EntitySnapshot, AssemblyError> {
    let fetches = Collection::ALL.iter().map(|&collection| async move {
        let result = match tokio::time::timeout(timeout, store.fetch_collection(collection)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };
        (collection, result)
    });

    let mut fetched = HashMap::new();
    let mut snapshot = EntitySnapshot::empty();

    for (collection, result) in futures::future::join_all(fetches).await {
        match result {
            Ok(rows) => {
                debug!("fetched {} rows from {collection}", rows.len());
                fetched.insert(collection, rows);
            }
            Err(source) if collection.is_required() => {
                return Err(AssemblyError::Fetch { collection, source });
            }
            Err(e) => {
                warn!("optional collection {collection} unavailable: {e}");
                snapshot.warnings.push(AssemblyWarning::CollectionUnavailable {
                    collection,
                    reason: e.to_string(),
                });
            }
        }
    }

    for kind in ComponentKind::ALL {
        let collection = Collection::for_kind(kind);
        let rows = fetched.remove(&collection).unwrap_or_default();
        let components = decode_rows(collection, &rows, &mut snapshot.warnings, |row| {
            Component::from_row(kind, row)
        });
        snapshot.components.extend(components);
    }

    for collection in [
        Collection::ServerConnectedSwitches,
        Collection::StorageConnectedSwitches,
        Collection::BackupConnectedSwitches,
    ] {
        let rows = fetched.remove(&collection).unwrap_or_default();
        let links = decode_rows(collection, &rows, &mut snapshot.warnings, |row| {
            serde_json::from_value::<SwitchLink>(row.clone())
        });
        snapshot
            .links
            .extend(links.into_iter().map(|link| (collection, link)));
    }

    let rows = fetched
        .remove(&Collection::NetworkConnectedComponents)
        .unwrap_or_default();
    snapshot.switch_ports = decode_rows(
        Collection::NetworkConnectedComponents,
        &rows,
        &mut snapshot.warnings,
        |row| serde_json::from_value::<SwitchPort>(row.clone()),
    );

    let rows = fetched.remove(&Collection::PrivateCloud).unwrap_or_default();
    snapshot.private_cloud = decode_rows(
        Collection::PrivateCloud,
        &rows,
        &mut snapshot.warnings,
        |row| serde_json::from_value::<PrivateCloud>(row.clone()),
    )
    .into_iter()
    .next();

    snapshot.fetched_at = Utc::now();

    Ok(snapshot)
}

/// Decode rows one by one; a bad row becomes a warning instead of an error
fn decode_rows<T>(
    collection: Collection,
    rows: &[Value],
    warnings: &mut Vec<AssemblyWarning>,
    decode: impl Fn(&Value) -> Result<T, serde_json::Error>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match decode(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping malformed row in {collection}: {e}");
                warnings.push(AssemblyWarning::MalformedRecord {
                    collection,
                    reason: e.to_string(),
                });
                None
            }
        })
        .collect()
}
