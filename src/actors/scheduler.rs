//! SchedulerActor - Decides when refresh cycles run
//!
//! Three trigger sources feed one loop:
//!
//! ```text
//!   interval timer ─────────────────────────────┐
//!   change notifications ──→ Debouncer ─────────┼──→ start_cycle ──→ [cycle task]
//!   RefreshNow command ─────────────────────────┘          │               │
//!                                                  in flight? drop   evaluate → tracker
//!                                                                          │   (oneshot)
//!                                              actor commits tracker ←─────┘
//! ```
//!
//! ## Invariants
//!
//! - At most one cycle is in flight. Triggers arriving meanwhile are
//!   dropped and counted, never queued.
//! - The alert tracker has a single writer. Each cycle works on its own
//!   copy and hands it back as soon as alerts are evaluated and dispatched;
//!   the actor commits it when the cycle ends, even if rendering panicked.
//!   A cycle that fails or panics before evaluation leaves the last
//!   committed tracker untouched.
//! - A failed cycle is logged and counted; the schedule carries on.
//! - After shutdown no new cycle starts. A cycle already in flight runs to
//!   completion first.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, error, info, instrument, warn};

use super::cycle::RefreshCycle;
use super::debounce::Debouncer;
use super::messages::{CycleReport, RefreshOutcome, SchedulerCommand, SchedulerStats, Trigger};
use super::watcher::ChangeReceiver;
use crate::alerts::HealthAlertTracker;
use crate::error::CycleError;

/// The running cycle and the channel its evaluated tracker comes back on
struct InFlight {
    handle: JoinHandle<Result<CycleReport, CycleError>>,
    commit: oneshot::Receiver<HealthAlertTracker>,
}

/// Scheduler timing
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Timer period; `None` disables the timer
    pub interval: Option<Duration>,

    /// Quiet window for change notifications
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Some(Duration::from_secs(10)),
            debounce: Duration::from_millis(1000),
        }
    }
}

/// Actor that drives refresh cycles
pub struct SchedulerActor {
    cycle: Arc<RefreshCycle>,

    /// Last committed alert state
    tracker: HealthAlertTracker,

    /// The running cycle, if any
    in_flight: Option<InFlight>,

    ticker: Option<Interval>,
    changes: Option<ChangeReceiver>,
    debouncer: Debouncer,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    stats: SchedulerStats,
}

impl SchedulerActor {
    pub fn new(
        cycle: Arc<RefreshCycle>,
        tracker: HealthAlertTracker,
        config: SchedulerConfig,
        changes: Option<ChangeReceiver>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        let ticker = config.interval.filter(|d| !d.is_zero()).map(|period| {
            // the startup refresh covers the first period
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        Self {
            cycle,
            tracker,
            in_flight: None,
            ticker,
            changes,
            debouncer: Debouncer::new(config.debounce),
            command_rx,
            stats: SchedulerStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting refresh scheduler");

        self.start_cycle(Trigger::Startup);

        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                // Handle commands
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RefreshNow { respond_to }) => {
                            let outcome = self.start_cycle(Trigger::Manual);
                            let _ = respond_to.send(outcome);
                        }

                        Some(SchedulerCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }

                // Cycle finished
                joined = join_in_flight(&mut self.in_flight) => {
                    if let Some(InFlight { commit, .. }) = self.in_flight.take() {
                        self.finish_cycle(commit, joined);
                    }
                }

                // Timer
                _ = next_tick(&mut self.ticker) => {
                    self.start_cycle(Trigger::Tick);
                }

                // Change notifications restart the debounce window
                changed = next_change(&mut self.changes) => {
                    if changed {
                        self.stats.change_notifications += 1;
                        self.debouncer.notify(Instant::now());
                    } else {
                        debug!("change source closed");
                        self.changes = None;
                    }
                }

                // Debounce window elapsed
                _ = sleep_until_deadline(deadline) => {
                    if self.debouncer.poll(Instant::now())
                        && self.start_cycle(Trigger::Debounced) == RefreshOutcome::Started
                    {
                        self.stats.debounced_refreshes += 1;
                    }
                }
            }
        }

        self.debouncer.cancel();
        self.ticker = None;

        if let Some(InFlight { handle, commit }) = self.in_flight.take() {
            debug!("waiting for in-flight refresh cycle");
            let joined = handle.await;
            self.finish_cycle(commit, joined);
        }

        debug!("refresh scheduler stopped");
    }

    fn start_cycle(&mut self, trigger: Trigger) -> RefreshOutcome {
        if self.in_flight.is_some() {
            self.stats.triggers_skipped += 1;
            debug!("refresh cycle already running, dropping {trigger} trigger");
            return RefreshOutcome::AlreadyRunning;
        }

        self.stats.cycles_started += 1;
        self.stats.running = true;

        let cycle = Arc::clone(&self.cycle);
        let mut tracker = self.tracker.clone();
        let (commit_tx, commit) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let evaluated = cycle.evaluate(&mut tracker, trigger).await?;
            // notifications are out, this state must survive the render half
            let _ = commit_tx.send(tracker);
            Ok::<_, CycleError>(cycle.render_and_publish(evaluated).await)
        });

        self.in_flight = Some(InFlight { handle, commit });
        RefreshOutcome::Started
    }

    fn finish_cycle(
        &mut self,
        mut commit: oneshot::Receiver<HealthAlertTracker>,
        joined: Result<Result<CycleReport, CycleError>, JoinError>,
    ) {
        self.stats.running = false;

        // the task has ended, so a sent tracker is already in the channel
        if let Ok(tracker) = commit.try_recv() {
            self.tracker = tracker;
        }

        let result = joined.unwrap_or_else(|e| Err(CycleError::Panicked(e.to_string())));

        match result {
            Ok(report) => {
                self.stats.cycles_completed += 1;
                self.stats.last_cycle_duration_ms =
                    Some(u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX));
                self.stats.last_completed_at = Some(Utc::now());
            }
            Err(e) => {
                self.stats.cycles_failed += 1;
                self.stats.last_error = Some(e.to_string());
                error!("refresh cycle failed: {e}");
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn next_change(changes: &mut Option<ChangeReceiver>) -> bool {
    match changes {
        Some(changes) => changes.changed().await,
        None => pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn join_in_flight(
    in_flight: &mut Option<InFlight>,
) -> Result<Result<CycleReport, CycleError>, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.handle).await,
        None => pending().await,
    }
}

/// Handle for controlling the SchedulerActor
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,

    /// Actor task, taken by the first `stop`
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SchedulerHandle {
    /// Spawn the scheduler; the startup refresh begins immediately
    pub fn spawn(
        cycle: Arc<RefreshCycle>,
        tracker: HealthAlertTracker,
        config: SchedulerConfig,
        changes: Option<ChangeReceiver>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(cycle, tracker, config, changes, cmd_rx);
        let task = tokio::spawn(actor.run());

        info!(
            "refresh scheduler started (interval {:?}, debounce {:?})",
            config.interval, config.debounce
        );

        Self {
            sender: cmd_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Ask for a refresh now; obeys the no-overlap rule
    pub async fn refresh_now(&self) -> Result<RefreshOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RefreshNow { respond_to: tx })
            .await
            .context("failed to send RefreshNow command")?;

        rx.await.context("failed to receive refresh outcome")
    }

    pub async fn stats(&self) -> Result<SchedulerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive stats")
    }

    /// Stop scheduling and wait for the actor to finish
    ///
    /// Idempotent. Returns once no further cycle can start; a cycle that was
    /// in flight has completed by then.
    pub async fn stop(&self) {
        // fails only if the actor is already gone
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("refresh scheduler task failed: {e}");
            }
        }
    }
}
