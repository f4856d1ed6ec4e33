// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Kernel Façade (spec §4.9): the external surface the transport layer
//! consumes. Composes every other kernel component; holds no state of its
//! own beyond the `Arc`s it was built from.

use std::sync::Arc;
use std::time::Duration;

use pm_core::{
    Approval, ApprovalId, Clock, Device, InteractionKind, KernelError, Repo, RepoId, Run, RunId,
};
use pm_storage::{ApprovalStore, DeviceStore, RepoStore, RunStore};

use super::event_log::{map_storage_err, EventLog};
use super::hub::{EventHub, Subscription};
use super::interactions::InteractionCoordinator;
use super::run_manager::RunManager;
use super::workspace::WorkspaceManager;

pub struct Facade {
    repos: Arc<dyn RepoStore>,
    devices: Arc<dyn DeviceStore>,
    runs: Arc<dyn RunStore>,
    approvals: Arc<dyn ApprovalStore>,
    event_log: Arc<EventLog>,
    hub: Arc<EventHub>,
    interactions: Arc<InteractionCoordinator>,
    run_manager: Arc<RunManager>,
    #[allow(dead_code)]
    workspace: Arc<WorkspaceManager>,
    clock: Arc<dyn Clock>,
}

impl Facade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repos: Arc<dyn RepoStore>,
        devices: Arc<dyn DeviceStore>,
        runs: Arc<dyn RunStore>,
        approvals: Arc<dyn ApprovalStore>,
        event_log: Arc<EventLog>,
        hub: Arc<EventHub>,
        interactions: Arc<InteractionCoordinator>,
        run_manager: Arc<RunManager>,
        workspace: Arc<WorkspaceManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repos, devices, runs, approvals, event_log, hub, interactions, run_manager, workspace, clock }
    }

    // -- Repositories --------------------------------------------------

    pub async fn create_repo(&self, name: String, git_url: Option<String>) -> Result<Repo, KernelError> {
        if name.trim().is_empty() {
            return Err(KernelError::InvalidInput("repo name must not be empty".to_string()));
        }
        let repo = Repo::new(name, git_url, self.clock.now());
        self.repos.insert(repo.clone()).await.map_err(map_storage_err)?;
        Ok(repo)
    }

    pub async fn get_repo(&self, id: RepoId) -> Result<Repo, KernelError> {
        self.repos.get(id).await.map_err(map_storage_err)?.ok_or_else(|| KernelError::NotFound(format!("repo {id}")))
    }

    pub async fn list_repos(&self) -> Result<Vec<Repo>, KernelError> {
        self.repos.list().await.map_err(map_storage_err)
    }

    pub async fn delete_repo(&self, id: RepoId) -> Result<(), KernelError> {
        if self.runs.active_run_for_repo(id).await.map_err(map_storage_err)?.is_some() {
            return Err(KernelError::Conflict(format!("repo {id} has an active run")));
        }
        if !self.repos.delete(id).await.map_err(map_storage_err)? {
            return Err(KernelError::NotFound(format!("repo {id}")));
        }
        Ok(())
    }

    // -- Devices ---------------------------------------------------------

    pub async fn register_device(&self, device: Device) -> Result<(), KernelError> {
        self.devices.upsert(device).await.map_err(map_storage_err)
    }

    pub async fn unregister_device(&self, token: &str) -> Result<(), KernelError> {
        if !self.devices.delete(token).await.map_err(map_storage_err)? {
            return Err(KernelError::NotFound(format!("device {token}")));
        }
        Ok(())
    }

    // -- Runs --------------------------------------------------------------

    pub async fn start_run(&self, repo_id: RepoId, prompt: String) -> Result<Run, KernelError> {
        if prompt.trim().is_empty() {
            return Err(KernelError::InvalidInput("prompt must not be empty".to_string()));
        }
        self.run_manager.start_run(repo_id, prompt).await
    }

    pub async fn get_run(&self, id: RunId) -> Result<Run, KernelError> {
        self.runs.get(id).await.map_err(map_storage_err)?.ok_or_else(|| KernelError::NotFound(format!("run {id}")))
    }

    pub async fn list_runs_by_repo(&self, repo_id: RepoId) -> Result<Vec<Run>, KernelError> {
        self.runs.list_by_repo(repo_id).await.map_err(map_storage_err)
    }

    pub async fn cancel_run(&self, id: RunId) -> Result<(), KernelError> {
        self.run_manager.cancel_run(id).await
    }

    pub async fn send_input(&self, run_id: RunId, text: String) -> Result<(), KernelError> {
        let run = self.get_run(run_id).await?;
        if run.state != pm_core::RunState::WaitingInput {
            return Err(KernelError::InvalidState(format!("run {run_id} is not waiting_input")));
        }
        self.interactions.send_input(run_id, text).await
    }

    /// A REST caller fetching recent history before opening a WebSocket
    /// doesn't need a live subscription, just the backlog.
    pub async fn list_events_since(&self, run_id: RunId, since_seq: u64) -> Result<Vec<pm_core::Event>, KernelError> {
        self.get_run(run_id).await?;
        self.event_log.list_since(run_id, since_seq).await
    }

    /// `SubscribeEvents(run_id, from_seq)` (spec §4.9). `run exists` is
    /// enforced up front so a caller subscribing to an unknown run gets a
    /// clean `not_found` instead of a subscription that never delivers.
    pub async fn subscribe_events(&self, run_id: RunId, from_seq: u64) -> Result<Subscription, KernelError> {
        self.get_run(run_id).await?;
        self.hub.subscribe(run_id, from_seq).await
    }

    // -- Interactions / approvals -----------------------------------------

    pub async fn list_pending_approvals(&self) -> Result<Vec<Approval>, KernelError> {
        self.approvals.list_pending().await.map_err(map_storage_err)
    }

    pub async fn get_approval(&self, id: ApprovalId) -> Result<Approval, KernelError> {
        self.approvals.get(id).await.map_err(map_storage_err)?.ok_or_else(|| KernelError::NotFound(format!("approval {id}")))
    }

    pub async fn resolve_approval(&self, id: ApprovalId, approved: bool, reason: Option<String>) -> Result<Approval, KernelError> {
        self.interactions.resolve_approval(id, approved, reason).await
    }

    /// `HookInteraction(request_id, run_id, type, tool, payload, deadline)`
    /// (spec §4.9). Fails fast with `not_found`/`invalid_state` if the run
    /// is unknown or already terminal, rather than blocking the hook caller
    /// against a run that can never resolve it.
    #[allow(clippy::too_many_arguments)]
    pub async fn hook_interaction(
        &self,
        request_id: &str,
        run_id: RunId,
        kind: InteractionKind,
        tool: &str,
        payload: serde_json::Value,
        deadline: Duration,
    ) -> Result<pm_core::Decision, KernelError> {
        let run = self.get_run(run_id).await?;
        if run.state.is_terminal() {
            return Err(KernelError::InvalidState(format!("run {run_id} is already terminal")));
        }
        self.interactions.request(request_id, run_id, kind, tool, payload, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::escalation::EscalationTracker;
    use super::super::run_manager::DriverFactory;
    use pm_adapters::{AgentDriver, ExitOutcome, FakeDriver, FakeEscalationSink};
    use pm_core::SystemClock;
    use pm_storage::{EventStore, InteractionStore, MemoryStore};
    use std::path::PathBuf;
    use std::time::Duration as StdDuration;

    struct AlwaysSucceeds;
    impl DriverFactory for AlwaysSucceeds {
        fn create(&self, _run_id: RunId, _workspace_path: PathBuf) -> Box<dyn AgentDriver> {
            Box::new(FakeDriver::new(ExitOutcome::Success))
        }
    }

    async fn build() -> Arc<Facade> {
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

        let escalation = Arc::new(EscalationTracker::new(Arc::new(FakeEscalationSink::new()), clock.clone(), vec![]));
        let interactions = Arc::new(InteractionCoordinator::new(
            interaction_store,
            approvals.clone(),
            runs.clone(),
            event_log.clone(),
            hub.clone(),
            clock.clone(),
            escalation,
        ));

        let tmp = tempfile::tempdir().unwrap();
        let workspace = Arc::new(WorkspaceManager::new(tmp.path().to_path_buf(), clock.clone(), true, StdDuration::from_secs(30)));
        let run_manager = Arc::new(RunManager::new(
            runs.clone(),
            repos.clone(),
            workspace.clone(),
            event_log.clone(),
            hub.clone(),
            interactions.clone(),
            clock.clone(),
            Arc::new(AlwaysSucceeds),
        ));

        Arc::new(Facade::new(repos, devices, runs, approvals, event_log, hub, interactions, run_manager, workspace, clock))
    }

    #[tokio::test]
    async fn creating_a_repo_and_starting_a_run_round_trips() {
        let facade = build().await;
        let repo = facade.create_repo("demo".to_string(), None).await.unwrap();
        let run = facade.start_run(repo.id, "write some code".to_string()).await.unwrap();
        assert_eq!(run.repo_id, repo.id);

        let fetched = facade.get_run(run.id).await.unwrap();
        assert_eq!(fetched.id, run.id);
    }

    #[tokio::test]
    async fn starting_a_run_on_an_unknown_repo_is_not_found() {
        let facade = build().await;
        let err = facade.start_run(RepoId::new(), "go".to_string()).await.unwrap_err();
        assert!(matches!(err, KernelError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_repo_with_an_active_run_conflicts() {
        let facade = build().await;
        let repo = facade.create_repo("demo".to_string(), None).await.unwrap();
        facade.start_run(repo.id, "go".to_string()).await.unwrap();

        let err = facade.delete_repo(repo.id).await.unwrap_err();
        assert!(matches!(err, KernelError::Conflict(_)));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_touching_the_run_manager() {
        let facade = build().await;
        let repo = facade.create_repo("demo".to_string(), None).await.unwrap();
        let err = facade.start_run(repo.id, "   ".to_string()).await.unwrap_err();
        assert!(matches!(err, KernelError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn hook_interaction_against_an_unknown_run_is_not_found() {
        let facade = build().await;
        let err = facade
            .hook_interaction("req-1", RunId::new(), InteractionKind::Input, "AskUser", serde_json::json!({}), StdDuration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::NotFound(_)));
    }

    #[tokio::test]
    async fn approval_round_trip_through_the_facade() {
        let facade = build().await;
        let repo = facade.create_repo("demo".to_string(), None).await.unwrap();
        let run = facade.start_run(repo.id, "go".to_string()).await.unwrap();
        let facade_for_hook = facade.clone();

        let handle = tokio::spawn(async move {
            facade_for_hook
                .hook_interaction("req-a", run.id, InteractionKind::Approval, "Edit", serde_json::json!({}), StdDuration::from_secs(5))
                .await
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let pending = facade.list_pending_approvals().await.unwrap();
        assert_eq!(pending.len(), 1);
        let resolved = facade.resolve_approval(pending[0].id, true, None).await.unwrap();
        assert_eq!(resolved.state, pm_core::ApprovalState::Approved);
        assert_eq!(handle.await.unwrap().unwrap(), pm_core::Decision::allow());
    }
}
