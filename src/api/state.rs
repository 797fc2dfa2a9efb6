//! API shared state

use std::sync::Arc;

use crate::actors::{SchedulerHandle, TopologyView, ViewReader};
use crate::api::error::{ApiError, ApiResult};
use crate::notify::Dispatcher;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Latest published topology view
    pub view: ViewReader,

    /// Handle to the refresh scheduler for stats and manual refreshes
    pub scheduler: SchedulerHandle,

    /// Notification dispatcher, for delivery counters
    pub dispatcher: Dispatcher,
}

impl ApiState {
    pub fn new(view: ViewReader, scheduler: SchedulerHandle, dispatcher: Dispatcher) -> Self {
        Self {
            view,
            scheduler,
            dispatcher,
        }
    }

    /// Latest view, or 503 until the first cycle has succeeded
    pub fn latest_view(&self) -> ApiResult<Arc<TopologyView>> {
        self.view.latest().ok_or_else(|| {
            ApiError::NotReady("topology not available yet, no refresh has succeeded".into())
        })
    }
}
