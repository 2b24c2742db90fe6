//! Integration tests for WavesLab
//!
//! Drives the real scheduler and HTTP dispatcher against an in-process
//! ingress listener.

use std::sync::Arc;
use std::time::Duration;

use nodestore::StateStore;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use waveslab::ingress::Ingress;
use waveslab::scheduler::{Scheduler, SchedulerConfig};

async fn spawn_ingress() -> (String, Ingress) {
    let ingress = Ingress::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind ingress");
    let addr = listener.local_addr().unwrap();
    let server = ingress.clone();
    tokio::spawn(async move { server.serve(listener, std::future::pending()).await });
    (format!("http://{}/monitoring", addr), ingress)
}

fn store_with_nodes(temp: &TempDir, endpoint: &str) -> Arc<StateStore> {
    let nodes = json!([
        {"id": "kitchen-faucet", "name": "Kitchen Faucet", "node_type": "WATER", "status": "OFF",
         "provision_rate": 1.5, "endpoint_url": endpoint, "assigned_user": null},
        {"id": "boiler", "name": "Boiler", "node_type": "GAS", "status": "OFF",
         "provision_rate": 2.0, "endpoint_url": endpoint, "assigned_user": null},
    ]);
    std::fs::write(temp.path().join("nodes.json"), nodes.to_string()).unwrap();
    std::fs::write(temp.path().join("users.json"), r#"[{"username": "alice"}]"#).unwrap();
    Arc::new(StateStore::open(temp.path()).expect("Failed to open store"))
}

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        interval_ms: 50,
        error_pause_ms: 20,
        request_timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn test_started_node_reports_to_ingress() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (url, ingress) = spawn_ingress().await;
    let store = store_with_nodes(&temp, &url);
    let mut rx = ingress.subscribe();

    let outcome = store.start_node("kitchen-faucet", Some("alice")).unwrap();
    assert!(outcome.success);

    let mut scheduler = Scheduler::new(fast_config(), Arc::clone(&store));
    scheduler.start().expect("Failed to start scheduler");

    let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("No report within timeout")
        .unwrap();
    assert_eq!(payload.node_name, "Kitchen Faucet");
    assert_eq!(payload.provision_rate, 1.5);
    assert_eq!(payload.username.as_deref(), Some("alice"));

    scheduler.stop().await;
    let stats = scheduler.stats();
    assert!(stats.delivered >= 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_stopped_node_stops_reporting() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (url, ingress) = spawn_ingress().await;
    let store = store_with_nodes(&temp, &url);
    let mut rx = ingress.subscribe();

    store.start_node("boiler", None).unwrap();
    let mut scheduler = Scheduler::new(fast_config(), Arc::clone(&store));
    scheduler.start().unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.node_name, "Boiler");
    assert_eq!(first.username, None);

    store.stop_node("boiler").unwrap();
    // Let any tick already in flight settle, then drain
    tokio::time::sleep(Duration::from_millis(200)).await;
    while rx.try_recv().is_ok() {}

    let delivered_before = scheduler.stats().delivered;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scheduler.stats().delivered, delivered_before);
    assert!(rx.try_recv().is_err());

    scheduler.stop().await;
}

#[tokio::test]
async fn test_unreachable_endpoint_counts_as_failure() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = store_with_nodes(&temp, &format!("http://{}/monitoring", addr));
    store.start_node("kitchen-faucet", None).unwrap();

    let mut scheduler = Scheduler::new(fast_config(), Arc::clone(&store));
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    scheduler.stop().await;

    let stats = scheduler.stats();
    assert!(stats.ticks >= 2, "loop should keep ticking: {:?}", stats);
    assert_eq!(stats.delivered, 0);
    assert!(stats.failed >= 2);
}
