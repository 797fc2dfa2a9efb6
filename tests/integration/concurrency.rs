//! Integration tests for scheduling and concurrent access
//!
//! These tests verify that:
//! - Refresh cycles never overlap, whoever asks for them
//! - Alerts stay edge-triggered across scheduler-driven cycles
//! - Slow notification delivery never holds a cycle up
//! - Readers only ever observe complete, ordered views

use std::sync::Arc;
use std::time::Duration;

use fleet_topology::{
    actors::{RefreshCycle, RefreshOutcome, SchedulerConfig, SchedulerHandle, Trigger},
    alerts::HealthAlertTracker,
};
use pretty_assertions::assert_eq;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::helpers::{create_fleet_document, log_dispatcher, memory_store, webhook_dispatcher};

fn timer(secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        interval: Some(Duration::from_secs(secs)),
        debounce: Duration::from_secs(1),
    }
}

fn manual_only() -> SchedulerConfig {
    SchedulerConfig {
        interval: None,
        debounce: Duration::from_secs(1),
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refresh_requests_start_one_cycle() {
    let store = memory_store(&create_fleet_document()).await;
    store.set_delay(Some(Duration::from_secs(5))).await;

    let cycle = Arc::new(RefreshCycle::new(store.clone(), log_dispatcher()));
    let scheduler = SchedulerHandle::spawn(cycle, HealthAlertTracker::default(), manual_only(), None);
    settle().await;

    // the startup cycle is still fetching
    let requests: Vec<_> = (0..10)
        .map(|_| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.refresh_now().await.unwrap() })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), RefreshOutcome::AlreadyRunning);
    }

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.refresh_now().await.unwrap() })
        })
        .collect();
    let mut started = 0;
    for request in requests {
        if request.await.unwrap() == RefreshOutcome::Started {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    let stats = scheduler.stats().await.unwrap();
    assert_eq!(stats.cycles_started, 2);
    assert_eq!(stats.triggers_skipped, 19);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_cycles_alert_once() {
    let store = memory_store(&create_fleet_document()).await;
    let dispatcher = log_dispatcher();

    let cycle = Arc::new(RefreshCycle::new(store, dispatcher.clone()));
    let reader = cycle.reader();
    let scheduler = SchedulerHandle::spawn(cycle, HealthAlertTracker::default(), timer(10), None);
    settle().await;

    tokio::time::sleep(Duration::from_secs(45)).await;
    settle().await;

    let stats = scheduler.stats().await.unwrap();
    assert_eq!(stats.cycles_completed, 5);

    scheduler.stop().await;
    dispatcher.drain().await;

    assert_eq!(dispatcher.stats().sent, 1);
    assert_eq!(reader.latest().map(|view| view.cycle), Some(5));
}

#[tokio::test]
async fn test_slow_transport_does_not_delay_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let dispatcher = webhook_dispatcher(&server);

    let cycle = RefreshCycle::new(memory_store(&create_fleet_document()).await, dispatcher.clone());

    let report = cycle
        .run(&mut HealthAlertTracker::default(), Trigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.alerts_raised, 1);
    assert!(report.duration < Duration::from_secs(1));
    assert_eq!(dispatcher.in_flight(), 1);

    dispatcher.drain().await;
    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(dispatcher.stats().sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_readers_see_ordered_complete_views() {
    let store = memory_store(&create_fleet_document()).await;
    let cycle = Arc::new(RefreshCycle::new(store, log_dispatcher()));
    let mut reader = cycle.reader();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(view) = reader.changed().await {
            assert_eq!(view.graph.node_count(), 6);
            assert_eq!(view.graph.edge_count(), 5);
            seen.push(view.cycle);
            if view.cycle >= 4 {
                break;
            }
        }
        seen
    });

    let scheduler = SchedulerHandle::spawn(cycle, HealthAlertTracker::default(), timer(1), None);
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    scheduler.stop().await;

    let seen = observer.await.unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(seen.last(), Some(&4));
}
