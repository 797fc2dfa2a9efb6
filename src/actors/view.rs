//! Latest published topology view
//!
//! The refresh cycle publishes a complete [`TopologyView`] once per
//! successful cycle; readers only ever see whole views. A failing cycle
//! publishes nothing, so readers keep the last known-good view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::AssemblyWarning;
use crate::model::ComponentId;
use crate::render::RenderedDocument;
use crate::topology::TopologyGraph;

/// Output of one successful refresh cycle
#[derive(Debug, Clone)]
pub struct TopologyView {
    /// Sequence number of the cycle that produced this view
    pub cycle: u64,

    pub graph: TopologyGraph,
    pub warnings: Vec<AssemblyWarning>,

    /// Components alerted after this cycle's evaluation
    pub alerted: Vec<ComponentId>,

    /// Documents the render sinks produced this cycle
    pub documents: Vec<RenderedDocument>,

    pub refreshed_at: DateTime<Utc>,
}

pub fn view_channel() -> (ViewPublisher, ViewReader) {
    let (tx, rx) = watch::channel(None);
    (ViewPublisher { tx }, ViewReader { rx })
}

#[derive(Debug)]
pub struct ViewPublisher {
    tx: watch::Sender<Option<Arc<TopologyView>>>,
}

impl ViewPublisher {
    pub fn publish(&self, view: TopologyView) {
        // readers may all be gone; the latest view is still kept
        self.tx.send_replace(Some(Arc::new(view)));
    }

    pub fn reader(&self) -> ViewReader {
        ViewReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewReader {
    rx: watch::Receiver<Option<Arc<TopologyView>>>,
}

impl ViewReader {
    /// Most recent view, `None` until the first cycle succeeded
    pub fn latest(&self) -> Option<Arc<TopologyView>> {
        self.rx.borrow().clone()
    }

    /// Wait until a view newer than the last one seen by this reader is published
    pub async fn changed(&mut self) -> Option<Arc<TopologyView>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}
