//! End-to-end refresh cycles: store → graph → alerts → sinks → view
//!
//! These tests drive `RefreshCycle::run` directly so every cycle boundary
//! is explicit.

use std::sync::Arc;
use std::time::Duration;

use fleet_topology::{
    actors::{RefreshCycle, Trigger},
    alerts::HealthAlertTracker,
    model::ComponentId,
    render::{DiagramSink, InteractiveSink},
    store::FileEntityStore,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{
    create_fleet_document, mock_webhook, received_payloads, set_health, webhook_dispatcher,
};

#[tokio::test]
async fn test_file_store_cycle_renders_and_alerts() {
    let dir = tempdir().unwrap();
    let fleet_path = dir.path().join("fleet.json");
    std::fs::write(&fleet_path, create_fleet_document().to_string()).unwrap();

    let webhook = mock_webhook(200).await;
    let dispatcher = webhook_dispatcher(&webhook);

    let cycle = RefreshCycle::new(Arc::new(FileEntityStore::new(&fleet_path)), dispatcher.clone())
        .with_sink(Arc::new(DiagramSink::new(dir.path().join("out/topology.dot"))))
        .with_sink(Arc::new(InteractiveSink::new(dir.path().join("out/topology.html"), 10)));
    let reader = cycle.reader();

    let mut tracker = HealthAlertTracker::default();
    let report = cycle.run(&mut tracker, Trigger::Manual).await.unwrap();

    assert_eq!(report.nodes, 6);
    assert_eq!(report.edges, 5);
    assert_eq!(report.alerts_raised, 1);
    assert_eq!(report.render_failures, 0);

    let view = reader.latest().expect("published view");
    assert_eq!(view.alerted, vec![ComponentId(2)]);
    assert_eq!(view.documents.len(), 2);

    let dot = std::fs::read_to_string(dir.path().join("out/topology.dot")).unwrap();
    assert!(dot.contains("Lab Topology"));
    assert!(dot.contains("n2 -- n100 [label=\"unknown (eth1)\""));
    assert!(dir.path().join("out/topology.html").exists());

    dispatcher.drain().await;
    let payloads = received_payloads(&webhook).await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["subject"], "Critical Alert: kvm-2");
    assert_eq!(payloads[0]["component_id"], 2);
}

#[tokio::test]
async fn test_alerts_fire_once_per_transition() {
    let dir = tempdir().unwrap();
    let fleet_path = dir.path().join("fleet.json");
    let mut document = create_fleet_document();
    std::fs::write(&fleet_path, document.to_string()).unwrap();

    let webhook = mock_webhook(200).await;
    let dispatcher = webhook_dispatcher(&webhook);
    let cycle = RefreshCycle::new(Arc::new(FileEntityStore::new(&fleet_path)), dispatcher.clone());
    let mut tracker = HealthAlertTracker::default();

    // critical three cycles in a row: one alert
    for _ in 0..3 {
        cycle.run(&mut tracker, Trigger::Tick).await.unwrap();
    }
    dispatcher.drain().await;
    assert_eq!(received_payloads(&webhook).await.len(), 1);

    set_health(&mut document, "servers", 2, "healthy");
    std::fs::write(&fleet_path, document.to_string()).unwrap();

    let report = cycle.run(&mut tracker, Trigger::Tick).await.unwrap();
    assert_eq!(report.alerts_cleared, 1);
    assert!(tracker.state().is_empty());

    set_health(&mut document, "servers", 2, "critical");
    std::fs::write(&fleet_path, document.to_string()).unwrap();
    cycle.run(&mut tracker, Trigger::Tick).await.unwrap();

    dispatcher.drain().await;
    let subjects: Vec<String> = received_payloads(&webhook)
        .await
        .iter()
        .map(|payload| payload["subject"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        subjects,
        vec![
            "Critical Alert: kvm-2",
            "Recovered: kvm-2",
            "Critical Alert: kvm-2"
        ]
    );
}

#[tokio::test]
async fn test_recovery_notifications_can_be_disabled() {
    let dir = tempdir().unwrap();
    let fleet_path = dir.path().join("fleet.json");
    let mut document = create_fleet_document();
    std::fs::write(&fleet_path, document.to_string()).unwrap();

    let webhook = mock_webhook(200).await;
    let dispatcher = webhook_dispatcher(&webhook).with_recovery_notifications(false);
    let cycle = RefreshCycle::new(Arc::new(FileEntityStore::new(&fleet_path)), dispatcher.clone())
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5));
    let mut tracker = HealthAlertTracker::default();

    cycle.run(&mut tracker, Trigger::Startup).await.unwrap();

    set_health(&mut document, "servers", 2, "degraded");
    std::fs::write(&fleet_path, document.to_string()).unwrap();
    cycle.run(&mut tracker, Trigger::Tick).await.unwrap();

    dispatcher.drain().await;
    assert_eq!(received_payloads(&webhook).await.len(), 1);

    let stats = dispatcher.stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.suppressed, 1);
}

#[tokio::test]
async fn test_embedded_connections_in_file_document() {
    let dir = tempdir().unwrap();
    let fleet_path = dir.path().join("fleet.json");
    let document = serde_json::json!({
        "servers": [
            {"id": 1, "name": "kvm-1", "health": "healthy",
             "connected_switches": [{"switch_id": 100, "port": "eth0"}]}
        ],
        "storage": [],
        "backup": [],
        "network_switches": [
            {"id": 100, "name": "tor-a", "health": "healthy",
             "connected_components": {"eth0": 1}}
        ]
    });
    std::fs::write(&fleet_path, document.to_string()).unwrap();

    let cycle = RefreshCycle::new(
        Arc::new(FileEntityStore::new(&fleet_path)),
        crate::helpers::log_dispatcher(),
    );
    let reader = cycle.reader();
    let report = cycle
        .run(&mut HealthAlertTracker::default(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.edges, 1);
    let view = reader.latest().unwrap();
    let edge = view
        .graph
        .edge_between(ComponentId(100), ComponentId(1))
        .expect("edge");
    assert_eq!(edge.port, "eth0");
}
