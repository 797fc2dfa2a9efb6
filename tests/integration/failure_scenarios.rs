//! Integration tests for failure handling
//!
//! These tests verify that:
//! - A failed fetch keeps the last good view and the alert state
//! - Optional collections degrade to warnings
//! - A failing sink or notification transport never fails the cycle

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use fleet_topology::{
    actors::{RefreshCycle, Trigger},
    alerts::HealthAlertTracker,
    error::{AssemblyError, AssemblyWarning, CycleError, FetchError},
    model::ComponentId,
    render::{DiagramSink, InteractiveSink},
    store::Collection,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

use crate::helpers::{
    create_fleet_document, log_dispatcher, memory_store, mock_webhook, webhook_dispatcher,
};

#[tokio::test]
async fn test_required_collection_failure_keeps_last_view() {
    let store = memory_store(&create_fleet_document()).await;
    let cycle = RefreshCycle::new(store.clone(), log_dispatcher());
    let reader = cycle.reader();
    let mut tracker = HealthAlertTracker::default();

    cycle.run(&mut tracker, Trigger::Startup).await.unwrap();
    let before = reader.latest().unwrap();

    store.fail_collection(Collection::NetworkSwitches).await;
    let result = cycle.run(&mut tracker, Trigger::Tick).await;

    assert_matches!(
        result,
        Err(CycleError::Assembly(AssemblyError::Fetch {
            collection: Collection::NetworkSwitches,
            source: FetchError::Status { status: 503 },
        }))
    );

    let after = reader.latest().unwrap();
    assert_eq!(after.cycle, before.cycle);
    assert!(tracker.state().contains(ComponentId(2)));

    // the store recovers, the next cycle publishes again without re-alerting
    store.recover_collection(Collection::NetworkSwitches).await;
    let report = cycle.run(&mut tracker, Trigger::Tick).await.unwrap();
    assert_eq!(report.alerts_raised, 0);
    assert!(reader.latest().unwrap().cycle > before.cycle);
}

#[tokio::test]
async fn test_optional_collection_failure_yields_partial_graph() {
    let store = memory_store(&create_fleet_document()).await;
    store.fail_collection(Collection::ServerConnectedSwitches).await;
    store.fail_collection(Collection::PrivateCloud).await;

    let cycle = RefreshCycle::new(store, log_dispatcher());
    let reader = cycle.reader();
    let report = cycle
        .run(&mut HealthAlertTracker::default(), Trigger::Manual)
        .await
        .unwrap();

    let view = reader.latest().unwrap();
    assert_eq!(report.nodes, 6);
    // kvm-1 still reaches tor-a through the switch-centric mapping
    assert!(view.graph.edge_between(ComponentId(1), ComponentId(100)).is_some());
    assert!(view.graph.edge_between(ComponentId(2), ComponentId(100)).is_none());
    assert!(view.graph.private_cloud().is_none());

    let unavailable: Vec<Collection> = view
        .warnings
        .iter()
        .filter_map(|warning| match warning {
            AssemblyWarning::CollectionUnavailable { collection, .. } => Some(*collection),
            _ => None,
        })
        .collect();
    assert_eq!(
        unavailable,
        vec![Collection::ServerConnectedSwitches, Collection::PrivateCloud]
    );
}

#[tokio::test]
async fn test_dangling_references_are_dropped_with_warnings() {
    let mut document = create_fleet_document();
    document["server_connected_switches"] = json!([
        {"server_id": 1, "switch_id": 100, "port": "eth0"},
        {"server_id": 99, "switch_id": 100, "port": "eth5"},
        {"server_id": 2, "switch_id": 999, "port": "eth1"}
    ]);
    document["network_connected_components"] = json!([]);

    let cycle = RefreshCycle::new(memory_store(&document).await, log_dispatcher());
    let reader = cycle.reader();
    cycle
        .run(&mut HealthAlertTracker::default(), Trigger::Manual)
        .await
        .unwrap();

    let view = reader.latest().unwrap();
    assert!(view.graph.edge_between(ComponentId(1), ComponentId(100)).is_some());
    assert!(view.graph.neighbours(ComponentId(2)).is_empty());
    assert_eq!(
        view.warnings,
        vec![
            AssemblyWarning::DanglingComponent {
                collection: Collection::ServerConnectedSwitches,
                component_id: ComponentId(99),
            },
            AssemblyWarning::DanglingSwitch {
                collection: Collection::ServerConnectedSwitches,
                switch_id: ComponentId(999),
            },
        ]
    );
}

#[tokio::test]
async fn test_failing_sink_does_not_affect_other_sinks() {
    let dir = tempdir().unwrap();
    // a regular file where the diagram sink expects a directory
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let cycle = RefreshCycle::new(
        memory_store(&create_fleet_document()).await,
        log_dispatcher(),
    )
    .with_sink(Arc::new(DiagramSink::new(blocker.join("topology.dot"))))
    .with_sink(Arc::new(InteractiveSink::new(dir.path().join("topology.html"), 5)));
    let reader = cycle.reader();

    let report = assert_ok!(
        cycle
            .run(&mut HealthAlertTracker::default(), Trigger::Manual)
            .await
    );

    assert_eq!(report.render_failures, 1);
    let view = reader.latest().unwrap();
    assert_eq!(view.documents.len(), 1);
    assert_eq!(view.documents[0].sink, "interactive");
    assert!(dir.path().join("topology.html").exists());
}

#[tokio::test]
async fn test_failing_transport_does_not_fail_cycle() {
    let webhook = mock_webhook(500).await;
    let dispatcher = webhook_dispatcher(&webhook);
    let cycle = RefreshCycle::new(memory_store(&create_fleet_document()).await, dispatcher.clone());
    let mut tracker = HealthAlertTracker::default();

    let report = assert_ok!(cycle.run(&mut tracker, Trigger::Manual).await);
    assert_eq!(report.alerts_raised, 1);

    dispatcher.drain().await;
    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.sent, 0);

    // delivery failure does not roll back the alert
    assert!(tracker.state().contains(ComponentId(2)));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = memory_store(&create_fleet_document()).await;
    store.set_delay(Some(Duration::from_secs(5))).await;

    let cycle = RefreshCycle::new(store, log_dispatcher())
        .with_timeouts(Duration::from_millis(50), Duration::from_secs(1));
    let reader = cycle.reader();

    let error = assert_err!(
        cycle
            .run(&mut HealthAlertTracker::default(), Trigger::Manual)
            .await
    );

    assert_matches!(
        error,
        CycleError::Assembly(AssemblyError::Fetch {
            source: FetchError::Timeout(_),
            ..
        })
    );
    assert!(reader.latest().is_none());
}
