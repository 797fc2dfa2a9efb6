//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - The topology document reflects the latest published view
//! - Manual refreshes obey the no-overlap rule
//! - Authentication middleware functions properly

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_topology::{
    actors::{RefreshCycle, RefreshOutcome, SchedulerConfig, SchedulerHandle, ViewReader},
    alerts::HealthAlertTracker,
    api::{ApiConfig, ApiState, spawn_api_server},
    store::MemoryEntityStore,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;

use crate::helpers::{create_fleet_document, log_dispatcher, memory_store};

const TOKEN: &str = "test-token";

// Helper to create test API server
async fn spawn_test_api(store: Arc<MemoryEntityStore>) -> (SocketAddr, SchedulerHandle, ViewReader) {
    let dispatcher = log_dispatcher();
    let cycle = Arc::new(RefreshCycle::new(store, dispatcher.clone()));
    let view = cycle.reader();
    let scheduler = SchedulerHandle::spawn(
        cycle,
        HealthAlertTracker::default(),
        SchedulerConfig {
            interval: None,
            debounce: Duration::from_secs(1),
        },
        None,
    );

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };
    let state = ApiState::new(view.clone(), scheduler.clone(), dispatcher);
    let addr = spawn_api_server(config, state).await.unwrap();

    (addr, scheduler, view)
}

async fn wait_for_view(view: &ViewReader) {
    let mut view = view.clone();
    if view.latest().is_none() {
        tokio::time::timeout(Duration::from_secs(5), view.changed())
            .await
            .expect("first view");
    }
}

async fn wait_for_cycle(view: &ViewReader, cycle: u64) {
    let mut view = view.clone();
    tokio::time::timeout(Duration::from_secs(5), async {
        while view.latest().is_none_or(|latest| latest.cycle < cycle) {
            view.changed().await;
        }
    })
    .await
    .expect("refreshed view");
}

fn sync_time(body: &Value) -> DateTime<Utc> {
    body["last_sync"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .expect("rfc3339 last_sync")
}

async fn get(addr: SocketAddr, route: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .get(format!("http://{addr}{route}"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_topology_data_endpoint() {
    let (addr, scheduler, view) = spawn_test_api(memory_store(&create_fleet_document()).await).await;
    wait_for_view(&view).await;

    let (status, body) = get(addr, "/api/topology_data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["private_cloud"]["name"], "Lab");
    assert_eq!(body["servers"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["network_switches"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["edges"].as_array().map(Vec::len), Some(5));
    assert_eq!(body["servers"][1]["health"], "critical");
    assert_eq!(body["servers"][1]["connected_switches"][0]["switch_name"], "tor-a");
    assert_eq!(body["alerted"], serde_json::json!([2]));
    assert_eq!(body["health_color_map"]["degraded"], "orange");

    scheduler.stop().await;
}

#[tokio::test]
async fn test_last_sync_and_alerts_endpoints() {
    let (addr, scheduler, view) = spawn_test_api(memory_store(&create_fleet_document()).await).await;
    wait_for_view(&view).await;

    let (status, body) = get(addr, "/api/last_sync_timestamp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cycle"], 1);
    let first = sync_time(&body);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.refresh_now().await.unwrap(), RefreshOutcome::Started);
    wait_for_cycle(&view, 2).await;

    let (_, body) = get(addr, "/api/last_sync_timestamp").await;
    assert_eq!(body["cycle"], 2);
    assert!(sync_time(&body) > first, "last_sync moves with each completed refresh");

    let (status, body) = get(addr, "/api/v1/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerted"][0]["name"], "kvm-2");
    assert_eq!(body["alerted"][0]["kind"], "compute");

    scheduler.stop().await;
}

#[tokio::test]
async fn test_refresh_endpoint_conflicts_while_running() {
    let store = memory_store(&create_fleet_document()).await;
    store.set_delay(Some(Duration::from_millis(500))).await;
    let (addr, scheduler, _view) = spawn_test_api(store.clone()).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/v1/refresh");

    // the startup cycle is still running
    let response = client.post(&url).bearer_auth(TOKEN).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    store.set_delay(None).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let response = client.post(&url).bearer_auth(TOKEN).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (_, stats) = get(addr, "/api/v1/stats").await;
    assert_eq!(stats["scheduler"]["cycles_started"], 2);
    assert_eq!(stats["scheduler"]["triggers_skipped"], 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_endpoints_require_token() {
    let (addr, scheduler, _view) = spawn_test_api(memory_store(&create_fleet_document()).await).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/api/topology_data"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("http://{addr}/api/topology_data"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // health stays reachable for probes
    let response = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    scheduler.stop().await;
}
