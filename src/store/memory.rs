//! In-memory entity store
//!
//! Holds collections in process memory. Useful for:
//! - Testing the refresh pipeline without a network or file system
//! - Simulating outages (`fail_collection`) and slow stores (`set_delay`)
//!
//! Collections never set behave like empty tables.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;

use super::{Collection, EntityStore};
use crate::error::FetchError;

/// In-memory entity store
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    /// Rows per collection
    collections: RwLock<HashMap<Collection, Vec<Value>>>,

    /// Collections that currently answer with an error
    failing: RwLock<HashSet<Collection>>,

    /// Artificial latency applied to every fetch
    delay: RwLock<Option<Duration>>,

    /// Number of fetches served, per collection
    fetches: Mutex<HashMap<Collection, usize>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of a collection
    pub async fn set_collection(&self, collection: Collection, rows: Vec<Value>) {
        self.collections.write().await.insert(collection, rows);
    }

    /// Make every fetch of `collection` fail until [`recover_collection`](Self::recover_collection)
    pub async fn fail_collection(&self, collection: Collection) {
        self.failing.write().await.insert(collection);
    }

    pub async fn recover_collection(&self, collection: Collection) {
        self.failing.write().await.remove(&collection);
    }

    /// Delay every fetch by `delay` (`None` removes the delay)
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// How many times `collection` has been fetched
    pub fn fetch_count(&self, collection: Collection) -> usize {
        self.fetches
            .lock()
            .map(|fetches| fetches.get(&collection).copied().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, FetchError> {
        if let Ok(mut fetches) = self.fetches.lock() {
            *fetches.entry(collection).or_default() += 1;
        }

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().await.contains(&collection) {
            trace!("simulating failure for {collection}");
            return Err(FetchError::Status { status: 503 });
        }

        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }
}
