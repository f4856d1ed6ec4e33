// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pmd` entry point.
//!
//! This file is intentionally thin: it loads configuration, wires the
//! kernel (spec §4), and starts the HTTP + WebSocket server. All route
//! handlers live in `pm_daemon::http`; all kernel wiring lives in
//! `pm_daemon::kernel`.

use std::sync::Arc;

use anyhow::Context;
use pm_adapters::LoggingEscalationSink;
use pm_core::{Clock, SystemClock};
use pm_daemon::config::Config;
use pm_daemon::http::{self, AppState};
use pm_daemon::kernel::{
    EscalationTracker, EventHub, EventLog, Facade, InteractionCoordinator, LocalDriverFactory,
    RunManager, WorkspaceManager,
};
use pm_storage::{ApprovalStore, DeviceStore, EventStore, InteractionStore, MemoryStore, RepoStore, RunStore};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load().context("failed to load configuration")?);
    let _log_guard = init_tracing(&config)?;

    std::fs::create_dir_all(&config.workspaces_root).context("failed to create workspaces root")?;

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
    escalation.clone().spawn_sweep_loop(std::time::Duration::from_secs(5));

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
    std::fs::create_dir_all(&hook_scripts_dir).context("failed to create hook scripts dir")?;

    let driver_factory = Arc::new(LocalDriverFactory {
        command: config.agent_command.clone(),
        args: config.agent_args.clone(),
        base_url: format!("http://{}", config.listen_addr),
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

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("pmd listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await.context("server crashed")?;

    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<WorkerGuard> {
    let log_dir = config.log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(log_dir).context("failed to create log directory")?;
    let file_name = config.log_path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "daemon.log".into());
    let file_appender = tracing_appender::rolling::daily(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(non_blocking)
        .init();

    Ok(guard)
}
