//! Error types for the refresh pipeline
//!
//! Fatal errors abort a single refresh cycle; warnings are accumulated and
//! surfaced as a count. Nothing here is fatal to the process.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::{ComponentId, ComponentKind};
use crate::store::Collection;

/// Entity store could not deliver a collection
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to entity store failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("entity store answered with HTTP {status}")]
    Status { status: u16 },

    #[error("malformed entity store response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("collection `{0}` is missing from the document")]
    MissingCollection(String),

    #[error("entity store did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Assembly could not produce even a partial graph
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to fetch required collection `{collection}`: {source}")]
    Fetch {
        collection: Collection,
        #[source]
        source: FetchError,
    },
}

/// Non-fatal problem met while fetching or assembling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum AssemblyWarning {
    /// An optional collection could not be fetched
    CollectionUnavailable { collection: Collection, reason: String },

    /// A single row could not be decoded and was skipped
    MalformedRecord { collection: Collection, reason: String },

    /// A component id appeared more than once across kinds
    DuplicateComponent { id: ComponentId, kind: ComponentKind },

    /// A connection referenced a component absent from the snapshot
    DanglingComponent {
        collection: Collection,
        component_id: ComponentId,
    },

    /// A connection referenced a switch absent from the snapshot
    DanglingSwitch {
        collection: Collection,
        switch_id: ComponentId,
    },

    /// A switch port mapped back onto the switch itself
    SelfLoop { switch_id: ComponentId, port: String },
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyWarning::CollectionUnavailable { collection, reason } => {
                write!(f, "collection `{collection}` unavailable: {reason}")
            }
            AssemblyWarning::MalformedRecord { collection, reason } => {
                write!(f, "skipped malformed row in `{collection}`: {reason}")
            }
            AssemblyWarning::DuplicateComponent { id, kind } => {
                write!(f, "duplicate component id {id} ({kind}) ignored")
            }
            AssemblyWarning::DanglingComponent {
                collection,
                component_id,
            } => write!(
                f,
                "`{collection}` references unknown component {component_id}"
            ),
            AssemblyWarning::DanglingSwitch {
                collection,
                switch_id,
            } => write!(f, "`{collection}` references unknown switch {switch_id}"),
            AssemblyWarning::SelfLoop { switch_id, port } => {
                write!(f, "switch {switch_id} port {port} maps onto itself")
            }
        }
    }
}

/// A rendering sink failed to produce its output
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode graph: {0}")]
    Format(String),

    #[error("render sink did not finish within {0:?}")]
    Timeout(Duration),
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Format(err.to_string())
    }
}

/// A notification could not be delivered
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification transport answered with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("notification transport did not answer within {0:?}")]
    Timeout(Duration),
}

/// A refresh cycle failed as a whole
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("refresh cycle panicked: {0}")]
    Panicked(String),
}
