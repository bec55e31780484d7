//! End-to-end tests for the shutdown protocol.

mod common;

use std::time::Duration;

use common::TestBackend;
use serde_json::json;

use keryx_server::{ServerConfig, ServerRegistry, StopSignal};

#[tokio::test]
async fn shutdown_endpoint_stops_the_server() {
    let backend = TestBackend::spawn();

    let resp = reqwest::Client::new()
        .post(backend.url("/shutdown"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"status": "stopping"}));

    // The accept loop observes the flag and the server thread ends.
    backend.join_within(Duration::from_secs(5));
}

#[tokio::test]
async fn stop_requested_through_registry_joins() {
    let backend = TestBackend::spawn();

    // Same protocol, driven directly rather than over HTTP.
    backend.stop_and_join();
}

#[tokio::test]
async fn shutdown_before_publication_reports_not_ready() {
    // A server whose shutdown handler consults a registry nothing ever
    // publishes through: the "too early" window, held open indefinitely.
    let registry = ServerRegistry::new();
    let config = ServerConfig::builder()
        .http_addr("127.0.0.1:0")
        .shutdown_timeout(Duration::from_millis(100))
        .build();

    let bound = keryx::api::build_server(config, registry.clone())
        .bind()
        .await
        .expect("bind should succeed");
    let addr = bound.local_addr();

    let stop = StopSignal::new();
    let serve_task = tokio::spawn(bound.serve(stop.clone()));

    let client = reqwest::Client::new();

    // Repeated early calls all get the defined "not ready" answer.
    for _ in 0..3 {
        let resp = client
            .post(format!("http://{addr}/shutdown"))
            .send()
            .await
            .expect("request should succeed");

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"status": "server not ready"}));
    }

    // Nothing was signalled: the server still serves, and the latch is
    // still unset.
    let resp = client
        .get(format!("http://{addr}/api/hello"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(resp.status(), 200);
    assert!(!registry.is_ready());
    assert!(!stop.is_requested());

    stop.request();
    tokio::time::timeout(Duration::from_secs(5), serve_task)
        .await
        .expect("serve should return after the stop request")
        .expect("task should not panic")
        .expect("serve should succeed");
}
