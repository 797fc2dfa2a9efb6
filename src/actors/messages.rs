//! Message types for the refresh scheduler
//!
//! Commands go to the scheduler over its mpsc channel; queries carry a
//! oneshot `respond_to` sender for the answer.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// What started a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The initial refresh when the scheduler starts
    Startup,

    /// The fixed-interval timer
    Tick,

    /// A burst of change notifications went quiet
    Debounced,

    /// Explicit request (API, tests)
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::Tick => "tick",
            Trigger::Debounced => "debounced",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Start a refresh cycle now, unless one is already running
    RefreshNow {
        respond_to: oneshot::Sender<RefreshOutcome>,
    },

    /// Get scheduler statistics
    GetStats {
        respond_to: oneshot::Sender<SchedulerStats>,
    },

    /// Stop scheduling; an in-flight cycle still runs to completion
    Shutdown,
}

/// Answer to a refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Started,

    /// Dropped, a cycle was in progress
    AlreadyRunning,
}

/// Summary of a completed refresh cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub trigger: Trigger,
    pub nodes: usize,
    pub edges: usize,
    pub warnings: usize,
    pub alerts_raised: usize,
    pub alerts_cleared: usize,
    pub render_failures: usize,
    pub duration: Duration,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,

    /// Triggers dropped because a cycle was running
    pub triggers_skipped: u64,

    /// Change notifications received from the change source
    pub change_notifications: u64,

    /// Refreshes started (or attempted) after a debounce window elapsed
    pub debounced_refreshes: u64,

    pub last_error: Option<String>,
    pub last_cycle_duration_ms: Option<u64>,
    pub last_completed_at: Option<DateTime<Utc>>,

    /// Whether a cycle is in flight right now
    pub running: bool,
}
