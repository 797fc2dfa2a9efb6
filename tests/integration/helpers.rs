//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fleet_topology::{
    notify::{Dispatcher, LogTransport, WebhookTransport},
    store::{Collection, MemoryEntityStore},
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Small lab fleet: two compute nodes, one storage node, one backup node
/// and two switches, with `kvm-2` critical.
pub fn create_fleet_document() -> Value {
    json!({
        "servers": [
            {"id": 1, "name": "kvm-1", "health": "healthy", "ip_address": "10.0.0.1"},
            {"id": 2, "name": "kvm-2", "health": "critical", "ip_address": "10.0.0.2"}
        ],
        "storage": [
            {"id": 10, "name": "ceph-1", "health": "healthy"}
        ],
        "backup": [
            {"id": 20, "name": "vault-1", "health": "degraded"}
        ],
        "network_switches": [
            {"id": 100, "name": "tor-a", "health": "healthy", "switch_type": "tor"},
            {"id": 101, "name": "tor-b", "health": "healthy", "switch_type": "tor"}
        ],
        "server_connected_switches": [
            {"server_id": 1, "switch_id": 100, "port": "eth0"},
            {"server_id": 2, "switch_id": 100, "port": "eth1"}
        ],
        "storage_connected_switches": [
            {"storage_id": 10, "switch_id": 101, "port": "eth0"}
        ],
        "backup_connected_switches": [
            {"backup_id": 20, "switch_id": 101, "port": "eth1"}
        ],
        "network_connected_components": [
            {"switch_id": 100, "port": "eth0", "component_id": 1},
            {"switch_id": 100, "port": "uplink", "component_id": 101}
        ],
        "private_cloud": {"id": 1, "name": "Lab", "last_sync": "2024-05-01T12:00:00Z"}
    })
}

/// Load every collection of a fleet document into a memory store
pub async fn memory_store(document: &Value) -> Arc<MemoryEntityStore> {
    let store = Arc::new(MemoryEntityStore::new());
    for collection in Collection::ALL {
        let rows = match document.get(collection.table_name()) {
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => vec![other.clone()],
            None => continue,
        };
        store.set_collection(collection, rows).await;
    }
    store
}

/// Set the health of one component row in a fleet document
pub fn set_health(document: &mut Value, table: &str, id: i64, health: &str) {
    let rows = document[table].as_array_mut().expect("component table");
    let row = rows
        .iter_mut()
        .find(|row| row["id"] == id)
        .expect("component row");
    row["health"] = json!(health);
}

pub fn log_dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(LogTransport), Duration::from_secs(1))
}

/// Mock webhook endpoint answering every POST with `status`
pub async fn mock_webhook(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

pub fn webhook_dispatcher(server: &MockServer) -> Dispatcher {
    Dispatcher::new(
        Arc::new(WebhookTransport::new(format!("{}/hook", server.uri()))),
        Duration::from_secs(5),
    )
}

/// Bodies of every request the mock server received, as JSON
pub async fn received_payloads(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
