//! One refresh cycle
//!
//! fetch → assemble → evaluate alerts → dispatch (detached) → render → publish
//!
//! A fetch failure of a required collection aborts the cycle before the
//! tracker is touched. The cycle runs in two halves: [`RefreshCycle::evaluate`]
//! settles the alert state and dispatches, [`RefreshCycle::render_and_publish`]
//! does the rest, so alert state can be committed before any sink runs. Render failures are per sink and never fail the
//! cycle. The view is published last, so readers never see a graph whose
//! cycle has not finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::messages::{CycleReport, Trigger};
use super::view::{TopologyView, ViewPublisher, ViewReader, view_channel};
use crate::alerts::HealthAlertTracker;
use crate::error::{AssemblyWarning, CycleError};
use crate::model::ComponentId;
use crate::notify::Dispatcher;
use crate::render::{RenderSink, render_all};
use crate::store::{EntityStore, fetch_snapshot};
use crate::topology::{Assembly, TopologyGraph, assemble};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a refresh cycle needs, shared by all cycles
pub struct RefreshCycle {
    store: Arc<dyn EntityStore>,
    dispatcher: Dispatcher,
    sinks: Vec<Arc<dyn RenderSink>>,
    publisher: ViewPublisher,
    fetch_timeout: Duration,
    render_timeout: Duration,
    sequence: AtomicU64,
}

impl RefreshCycle {
    pub fn new(store: Arc<dyn EntityStore>, dispatcher: Dispatcher) -> Self {
        let (publisher, _reader) = view_channel();
        Self {
            store,
            dispatcher,
            sinks: Vec::new(),
            publisher,
            fetch_timeout: DEFAULT_TIMEOUT,
            render_timeout: DEFAULT_TIMEOUT,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_timeouts(mut self, fetch: Duration, render: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.render_timeout = render;
        self
    }

    /// Reader for the views this cycle publishes
    pub fn reader(&self) -> ViewReader {
        self.publisher.reader()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[instrument(skip(self, tracker), fields(store = %self.store.describe()))]
    pub async fn run(
        &self,
        tracker: &mut HealthAlertTracker,
        trigger: Trigger,
    ) -> Result<CycleReport, CycleError> {
        let evaluated = self.evaluate(tracker, trigger).await?;
        Ok(self.render_and_publish(evaluated).await)
    }

    /// First half of a cycle: fetch, assemble, evaluate alerts and dispatch
    ///
    /// Once this returns `Ok` the notifications are out and `tracker` holds
    /// the state they were raised from.
    pub async fn evaluate(
        &self,
        tracker: &mut HealthAlertTracker,
        trigger: Trigger,
    ) -> Result<EvaluatedCycle, CycleError> {
        let started = Instant::now();
        let cycle = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("refresh cycle {cycle} started ({trigger})");

        let snapshot = fetch_snapshot(self.store.as_ref(), self.fetch_timeout).await?;
        let Assembly { graph, warnings } = assemble(&snapshot);

        if !warnings.is_empty() {
            warn!("cycle {cycle}: {} assembly warnings", warnings.len());
            for warning in &warnings {
                debug!("{warning}");
            }
        }

        let events = tracker.evaluate(&graph);
        for event in &events {
            self.dispatcher.dispatch(event);
        }
        let alerts_raised = events.iter().filter(|e| e.is_raised()).count();

        Ok(EvaluatedCycle {
            cycle,
            trigger,
            started,
            graph,
            warnings,
            alerted: tracker.state().ids().collect(),
            alerts_raised,
            alerts_cleared: events.len() - alerts_raised,
        })
    }

    /// Second half of a cycle: render every sink, then publish the view
    pub async fn render_and_publish(&self, evaluated: EvaluatedCycle) -> CycleReport {
        let EvaluatedCycle {
            cycle,
            trigger,
            started,
            graph,
            warnings,
            alerted,
            alerts_raised,
            alerts_cleared,
        } = evaluated;

        let outcomes = render_all(&self.sinks, &graph, self.render_timeout).await;
        let render_failures = outcomes.iter().filter(|o| o.result.is_err()).count();
        let documents = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.result.ok())
            .collect();

        let report = CycleReport {
            cycle,
            trigger,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            warnings: warnings.len(),
            alerts_raised,
            alerts_cleared,
            render_failures,
            duration: started.elapsed(),
        };

        self.publisher.publish(TopologyView {
            cycle,
            alerted,
            graph,
            warnings,
            documents,
            refreshed_at: Utc::now(),
        });

        info!(
            "refresh cycle {cycle} done in {:?}: {} nodes, {} edges, {} raised, {} cleared",
            report.duration,
            report.nodes,
            report.edges,
            report.alerts_raised,
            report.alerts_cleared
        );

        report
    }
}

/// A cycle whose alert state is settled but which has not rendered yet
#[derive(Debug)]
pub struct EvaluatedCycle {
    cycle: u64,
    trigger: Trigger,
    started: Instant,
    graph: TopologyGraph,
    warnings: Vec<AssemblyWarning>,
    alerted: Vec<ComponentId>,
    alerts_raised: usize,
    alerts_cleared: usize,
}
