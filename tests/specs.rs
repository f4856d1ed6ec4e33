// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! HTTP-level smoke test (spec §6/§8): binds `pmd`'s real router to a real,
//! ephemeral TCP port and drives it with `reqwest`, the way an operator
//! client or `pm-cli` would see it. The seven literal scenarios live in
//! `crates/daemon/tests/scenarios.rs` against the in-process `Facade`; this
//! file only checks that the transport layer (routing, auth, status/body
//! mapping) is wired correctly end to end.

use std::sync::Arc;
use std::time::Duration;

use pm_adapters::LoggingEscalationSink;
use pm_core::{Clock, SystemClock};
use pm_daemon::config::Config;
use pm_daemon::http::{self, AppState};
use pm_daemon::kernel::{
    EscalationTracker, EventHub, EventLog, Facade, InteractionCoordinator, LocalDriverFactory, RunManager,
    WorkspaceManager,
};
use pm_storage::{ApprovalStore, DeviceStore, EventStore, InteractionStore, MemoryStore, RepoStore, RunStore};
use serial_test::serial;

/// A running daemon bound to an ephemeral port, torn down when dropped.
struct Daemon {
    base_url: String,
    _workdir: tempfile::TempDir,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn test_config(workdir: &std::path::Path, operator_token: Option<&str>) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        workspaces_root: workdir.join("workspaces"),
        hook_token: "test-hook-token".to_string(),
        operator_token: operator_token.map(str::to_string),
        hook_timeout: Duration::from_secs(5),
        shallow_clone: true,
        clone_timeout: Duration::from_secs(5),
        agent_command: "true".to_string(),
        agent_args: Vec::new(),
        approval_tools: vec!["Bash".to_string()],
        input_tools: vec!["AskUser".to_string()],
        strip_env: Vec::new(),
        escalation_offsets: vec![Duration::from_secs(0)],
        log_path: workdir.join("daemon.log"),
    }
}

/// Wires the same components `pmd`'s `main` does, against an in-memory
/// store, and serves the router on a real OS-assigned port.
async fn spawn(operator_token: Option<&str>) -> Daemon {
    let workdir = tempfile::tempdir().expect("tempdir");
    let config = Arc::new(test_config(workdir.path(), operator_token));
    std::fs::create_dir_all(&config.workspaces_root).expect("create workspaces root");

    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let event_store: Arc<dyn EventStore> = store.clone();
    let hub = Arc::new(EventHub::new(event_store.clone()));
    let event_log = Arc::new(EventLog::new(event_store, hub.clone(), clock.clone()));

    let runs: Arc<dyn RunStore> = store.clone();
    let repos: Arc<dyn RepoStore> = store.clone();
    let devices: Arc<dyn DeviceStore> = store.clone();
    let approvals: Arc<dyn ApprovalStore> = store.clone();
    let interaction_store: Arc<dyn InteractionStore> = store.clone();

    let escalation_sink = Arc::new(LoggingEscalationSink::default());
    let escalation = Arc::new(EscalationTracker::new(escalation_sink, clock.clone(), config.escalation_offsets.clone()));

    let interactions = Arc::new(InteractionCoordinator::new(
        interaction_store,
        approvals.clone(),
        runs.clone(),
        event_log.clone(),
        hub.clone(),
        clock.clone(),
        escalation,
    ));

    let workspace = Arc::new(WorkspaceManager::new(
        config.workspaces_root.clone(),
        clock.clone(),
        config.shallow_clone,
        config.clone_timeout,
    ));

    let hook_scripts_dir = config.workspaces_root.join(".pm-hooks");
    std::fs::create_dir_all(&hook_scripts_dir).expect("create hook scripts dir");

    let driver_factory = Arc::new(LocalDriverFactory {
        command: config.agent_command.clone(),
        args: config.agent_args.clone(),
        base_url: "http://127.0.0.1:0".to_string(),
        bearer_token: config.hook_token.clone(),
        hook_timeout: config.hook_timeout,
        approval_tools: config.approval_tools.clone(),
        input_tools: config.input_tools.clone(),
        hook_scripts_dir,
        strip_env: config.strip_env.clone(),
    });

    let run_manager = Arc::new(RunManager::new(
        runs.clone(),
        repos.clone(),
        workspace.clone(),
        event_log.clone(),
        hub.clone(),
        interactions.clone(),
        clock.clone(),
        driver_factory,
    ));

    let facade = Arc::new(Facade::new(
        repos, devices, runs, approvals, event_log, hub, interactions, run_manager, workspace, clock,
    ));

    let state = AppState { facade, config: config.clone() };
    let app = http::with_layers(http::build_router(state));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Daemon { base_url: format!("http://{addr}"), _workdir: workdir, server }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().timeout(Duration::from_secs(5)).build().expect("http client")
}

#[tokio::test]
#[serial]
async fn repo_lifecycle_round_trips_over_http() {
    let daemon = spawn(None).await;
    let http = client();

    let created: serde_json::Value = http
        .post(format!("{}/api/repos", daemon.base_url))
        .json(&serde_json::json!({"name": "demo", "git_url": null}))
        .send()
        .await
        .expect("create repo")
        .json()
        .await
        .expect("decode repo");
    let repo_id = created["id"].as_str().expect("repo id").to_string();
    assert_eq!(created["name"], "demo");

    let listed: Vec<serde_json::Value> = http
        .get(format!("{}/api/repos", daemon.base_url))
        .send()
        .await
        .expect("list repos")
        .json()
        .await
        .expect("decode repo list");
    assert!(listed.iter().any(|r| r["id"] == repo_id));

    let fetched = http.get(format!("{}/api/repos/{repo_id}", daemon.base_url)).send().await.expect("get repo");
    assert_eq!(fetched.status(), reqwest::StatusCode::OK);

    let deleted = http.delete(format!("{}/api/repos/{repo_id}", daemon.base_url)).send().await.expect("delete repo");
    assert!(deleted.status().is_success());

    let gone = http.get(format!("{}/api/repos/{repo_id}", daemon.base_url)).send().await.expect("get deleted repo");
    assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = gone.json().await.expect("decode error body");
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
#[serial]
async fn starting_a_run_against_an_unknown_repo_is_404() {
    let daemon = spawn(None).await;
    let http = client();

    let repo_id = pm_core::RepoId::new();
    let resp = http
        .post(format!("{}/api/repos/{repo_id}/runs", daemon.base_url))
        .json(&serde_json::json!({"prompt": "do something"}))
        .send()
        .await
        .expect("start run");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn operator_routes_require_the_configured_bearer_token() {
    let daemon = spawn(Some("secret-operator-token")).await;
    let http = client();

    let unauthenticated = http.get(format!("{}/api/repos", daemon.base_url)).send().await.expect("unauthenticated list");
    assert_eq!(unauthenticated.status(), reqwest::StatusCode::UNAUTHORIZED);

    let wrong_token = http
        .get(format!("{}/api/repos", daemon.base_url))
        .bearer_auth("not-the-right-token")
        .send()
        .await
        .expect("wrong token list");
    assert_eq!(wrong_token.status(), reqwest::StatusCode::UNAUTHORIZED);

    let authenticated = http
        .get(format!("{}/api/repos", daemon.base_url))
        .bearer_auth("secret-operator-token")
        .send()
        .await
        .expect("authenticated list");
    assert_eq!(authenticated.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn hook_endpoint_rejects_missing_or_wrong_bearer() {
    let daemon = spawn(None).await;
    let http = client();

    let body = serde_json::json!({
        "run_id": pm_core::RunId::new().to_string(),
        "type": "approval",
        "tool": "Bash",
        "request_id": "req-1",
        "payload": {"command": "ls"},
    });

    let no_auth = http
        .post(format!("{}/api/internal/interaction-request", daemon.base_url))
        .json(&body)
        .send()
        .await
        .expect("unauthenticated hook call");
    assert_eq!(no_auth.status(), reqwest::StatusCode::UNAUTHORIZED);

    let wrong_auth = http
        .post(format!("{}/api/internal/interaction-request", daemon.base_url))
        .bearer_auth("wrong-token")
        .json(&body)
        .send()
        .await
        .expect("wrongly authenticated hook call");
    assert_eq!(wrong_auth.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn hook_endpoint_rejects_request_id_header_mismatch() {
    let daemon = spawn(None).await;
    let http = client();

    let body = serde_json::json!({
        "run_id": pm_core::RunId::new().to_string(),
        "type": "approval",
        "tool": "Bash",
        "request_id": "req-1",
        "payload": {"command": "ls"},
    });

    let resp = http
        .post(format!("{}/api/internal/interaction-request", daemon.base_url))
        .bearer_auth("test-hook-token")
        .header("X-M-Request-ID", "req-mismatched")
        .json(&body)
        .send()
        .await
        .expect("mismatched request id");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let decoded: serde_json::Value = resp.json().await.expect("decode error body");
    assert_eq!(decoded["error"]["code"], "invalid_input");
}

#[tokio::test]
#[serial]
async fn device_registration_round_trips_over_http() {
    let daemon = spawn(None).await;
    let http = client();

    let register = http
        .post(format!("{}/api/devices", daemon.base_url))
        .json(&serde_json::json!({"token": "device-token-1", "platform": "ios"}))
        .send()
        .await
        .expect("register device");
    assert!(register.status().is_success());

    let unregister =
        http.delete(format!("{}/api/devices/device-token-1", daemon.base_url)).send().await.expect("unregister device");
    assert!(unregister.status().is_success());
}

#[tokio::test]
#[serial]
async fn pending_approvals_starts_empty() {
    let daemon = spawn(None).await;
    let http = client();

    let pending: Vec<pm_wire::ApprovalSummary> = http
        .get(format!("{}/api/approvals/pending", daemon.base_url))
        .send()
        .await
        .expect("list pending approvals")
        .json()
        .await
        .expect("decode approvals");
    similar_asserts::assert_eq!(pending, Vec::<pm_wire::ApprovalSummary>::new());
}

/// `pm --help` is the simplest possible check that the operator CLI binary
/// still builds and runs, independent of anything the daemon is doing.
#[test]
fn cli_help_runs_successfully() {
    assert_cmd::Command::cargo_bin("pm").expect("locate pm binary").arg("--help").assert().success();
}
