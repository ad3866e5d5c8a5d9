// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use opencli_daemon::config::Config;
use opencli_daemon::state::AppState;
use opencli_daemon::store::Store;
use tokio::net::TcpListener;

async fn start_test_server() -> Option<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("failed to bind test listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    let mut registry = opencli_core::registry::DomainRegistry::new();
    opencli_domains::register_builtin_domains(&mut registry).unwrap();
    let registry: opencli_core::registry::SharedRegistry = Arc::new(registry);
    let store = Store::open_in_memory().unwrap();
    let state = AppState::new(registry, Arc::new(Config::default()), store);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, opencli_daemon::server::router(state)).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Some((addr, server_handle))
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let Some((addr, _handle)) = start_test_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let resp = reqwest::get(format!("http://{addr}/health")).await.expect("request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.expect("invalid JSON body");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn execute_dispatches_bare_task_type_through_the_registry() {
    let Some((addr, _handle)) = start_test_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/execute"))
        .json(&serde_json::json!({"method": "calculator_eval", "params": {"expression": "2+2"}}))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.expect("invalid JSON body");
    assert_eq!(body["result"], 4);
}

#[tokio::test]
async fn execute_reports_not_found_for_an_unclaimed_domain() {
    let Some((addr, _handle)) = start_test_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/execute"))
        .json(&serde_json::json!({"method": "no_such_domain.whatever", "params": {}}))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn config_post_merges_partial_body_onto_the_running_config() {
    let Some((addr, _handle)) = start_test_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let client = reqwest::Client::new();
    let before = client
        .get(format!("http://{addr}/api/v1/config"))
        .send()
        .await
        .expect("get failed")
        .json::<serde_json::Value>()
        .await
        .expect("invalid JSON body");

    let resp = client
        .post(format!("http://{addr}/api/v1/config"))
        .json(&serde_json::json!({"server": {"http_port": 4321}}))
        .send()
        .await
        .expect("post failed");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let after: serde_json::Value = resp.json().await.expect("invalid JSON body");

    assert_eq!(after["server"]["http_port"], 4321);
    assert_eq!(after["server"]["bind_address"], before["server"]["bind_address"]);
    assert_eq!(after["server"]["ws_port"], before["server"]["ws_port"]);
    assert_eq!(after["log"], before["log"]);
}

#[tokio::test]
async fn pipeline_crud_round_trips_through_the_store() {
    let Some((addr, _handle)) = start_test_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let client = reqwest::Client::new();
    let pipeline = serde_json::json!({
        "id": "p1",
        "name": "test pipeline",
        "description": "",
        "nodes": [{"id": "a", "type": "calculator_eval", "domain": null, "label": null,
                   "position": {"x": 0.0, "y": 0.0}, "params": {"expression": "1+1"}}],
        "edges": [],
        "parameters": [],
    });

    let created = client
        .post(format!("http://{addr}/api/v1/pipelines"))
        .json(&pipeline)
        .send()
        .await
        .expect("create failed");
    assert_eq!(created.status(), reqwest::StatusCode::OK);

    let fetched = client
        .get(format!("http://{addr}/api/v1/pipelines/p1"))
        .send()
        .await
        .expect("get failed");
    assert_eq!(fetched.status(), reqwest::StatusCode::OK);

    let ran = client
        .post(format!("http://{addr}/api/v1/pipelines/p1/run"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("run failed");
    assert_eq!(ran.status(), reqwest::StatusCode::OK);
    let result: serde_json::Value = ran.json().await.expect("invalid JSON body");
    assert_eq!(result["success"], true);

    let deleted = client
        .delete(format!("http://{addr}/api/v1/pipelines/p1"))
        .send()
        .await
        .expect("delete failed");
    assert_eq!(deleted.status(), reqwest::StatusCode::OK);

    let missing = client
        .get(format!("http://{addr}/api/v1/pipelines/p1"))
        .send()
        .await
        .expect("get after delete failed");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
