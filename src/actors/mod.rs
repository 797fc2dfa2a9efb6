//! Refresh scheduling
//!
//! The scheduler is an actor: an independent tokio task that owns its
//! state and is driven through an mpsc command channel. Each refresh cycle
//! runs on a task of its own so that the actor stays responsive while a
//! slow store or sink holds the cycle up.
//!
//! ## Architecture Overview
//!
//! ```text
//!   FileWatcher ──changed()──┐
//!                            ▼
//!   SchedulerHandle ──cmd──→ SchedulerActor ──spawn──→ RefreshCycle::run
//!                                                        │
//!                        fetch_snapshot → assemble → tracker.evaluate
//!                                                        │
//!                          Dispatcher::dispatch ←────────┤ (detached tasks)
//!                          render_all ←──────────────────┤
//!                          ViewPublisher::publish ←──────┘
//!                                   │
//!                              ViewReader (API, tests)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc channel into the scheduler
//! 2. **Request/Response**: oneshot channels for `RefreshNow` and `GetStats`
//! 3. **Latest value**: watch channel carrying the published view

pub mod cycle;
pub mod debounce;
pub mod messages;
pub mod scheduler;
pub mod view;
pub mod watcher;

pub use cycle::{EvaluatedCycle, RefreshCycle};
pub use messages::{CycleReport, RefreshOutcome, SchedulerStats, Trigger};
pub use scheduler::{SchedulerConfig, SchedulerHandle};
pub use view::{TopologyView, ViewReader};
pub use watcher::{ChangeNotifier, ChangeReceiver, FileWatcher, change_channel};
