// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Run Manager (spec §4.7): the state machine and composer. Owns
//! `StartRun`/`CancelRun`, the per-repo "one active run" invariant, and the
//! supervisor task that pumps an Agent Driver's stdout/stderr into events
//! and awaits its exit.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pm_adapters::{AgentDriver, DriverConfig, ExitOutcome, HookConfig, LocalDriver};
use pm_core::{Clock, EventKind, KernelError, RepoId, Run, RunId, RunState, RunTransition};
use pm_storage::{RepoStore, RunStore};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use super::event_log::{map_storage_err, EventLog};
use super::hub::EventHub;
use super::interactions::InteractionCoordinator;
use super::transitions::apply_transition;
use super::workspace::WorkspaceManager;

/// Builds an [`AgentDriver`] for a run. Lets the Run Manager stay agnostic
/// of the concrete driver (a real subprocess in production, `FakeDriver` in
/// tests) while still owning the per-run env/hook wiring.
pub trait DriverFactory: Send + Sync + 'static {
    fn create(&self, run_id: RunId, workspace_path: PathBuf) -> Box<dyn AgentDriver>;
}

/// Builds [`LocalDriver`]s with the static parts of the hook/process
/// configuration fixed at construction and the per-run parts (id, path)
/// filled in at spawn time.
pub struct LocalDriverFactory {
    pub command: String,
    pub args: Vec<String>,
    pub base_url: String,
    pub bearer_token: String,
    pub hook_timeout: std::time::Duration,
    pub approval_tools: Vec<String>,
    pub input_tools: Vec<String>,
    pub hook_scripts_dir: PathBuf,
    pub strip_env: Vec<String>,
}

impl DriverFactory for LocalDriverFactory {
    fn create(&self, run_id: RunId, workspace_path: PathBuf) -> Box<dyn AgentDriver> {
        Box::new(LocalDriver::new(DriverConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            workspace_path,
            hook: HookConfig {
                run_id,
                base_url: self.base_url.clone(),
                bearer_token: self.bearer_token.clone(),
                timeout: self.hook_timeout,
                approval_tools: self.approval_tools.clone(),
                input_tools: self.input_tools.clone(),
            },
            hook_scripts_dir: self.hook_scripts_dir.clone(),
            strip_env: self.strip_env.clone(),
        }))
    }
}

pub struct RunManager {
    runs: Arc<dyn RunStore>,
    repos: Arc<dyn RepoStore>,
    workspace: Arc<WorkspaceManager>,
    event_log: Arc<EventLog>,
    hub: Arc<EventHub>,
    interactions: Arc<InteractionCoordinator>,
    clock: Arc<dyn Clock>,
    driver_factory: Arc<dyn DriverFactory>,
    repo_locks: Mutex<HashMap<RepoId, Arc<AsyncMutex<()>>>>,
    /// One token per in-flight run. The supervisor task owns the driver
    /// outright; `cancel_run` only flips this token so it never contends
    /// with the supervisor's in-progress `wait()` (spec §4.7 "cancel is
    /// best-effort signalling, not a synchronous stop").
    running: Mutex<HashMap<RunId, CancellationToken>>,
}

impl RunManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runs: Arc<dyn RunStore>,
        repos: Arc<dyn RepoStore>,
        workspace: Arc<WorkspaceManager>,
        event_log: Arc<EventLog>,
        hub: Arc<EventHub>,
        interactions: Arc<InteractionCoordinator>,
        clock: Arc<dyn Clock>,
        driver_factory: Arc<dyn DriverFactory>,
    ) -> Self {
        Self {
            runs,
            repos,
            workspace,
            event_log,
            hub,
            interactions,
            clock,
            driver_factory,
            repo_locks: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    fn repo_lock(&self, repo_id: RepoId) -> Arc<AsyncMutex<()>> {
        self.repo_locks.lock().entry(repo_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `StartRun(repo_id, prompt) -> Run` (spec §4.7).
    pub async fn start_run(self: &Arc<Self>, repo_id: RepoId, prompt: String) -> Result<Run, KernelError> {
        let lock = self.repo_lock(repo_id);
        let _guard = lock.lock().await;

        if self.runs.active_run_for_repo(repo_id).await.map_err(map_storage_err)?.is_some() {
            return Err(KernelError::Conflict(format!("repo {repo_id} already has an active run")));
        }
        let repo = self
            .repos
            .get(repo_id)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("repo {repo_id}")))?;

        let run_id = RunId::new();
        let now = self.clock.now();
        let workspace_path = self.workspace.path(run_id);
        let run = Run {
            id: run_id,
            repo_id,
            prompt: prompt.clone(),
            state: RunState::Running,
            workspace_path: workspace_path.clone(),
            created_at: now,
            updated_at: now,
        };
        self.runs.insert(run.clone()).await.map_err(map_storage_err)?;

        if let Err(e) = self.workspace.create(run_id, repo_id, repo.git_url.as_deref()).await {
            return self.fail_at_birth(run_id, format!("workspace creation failed: {e}")).await;
        }

        self.event_log.append(run_id, EventKind::RunStarted, serde_json::json!({"prompt": prompt})).await?;

        let mut driver = self.driver_factory.create(run_id, workspace_path);
        if let Err(e) = driver.start().await {
            return self.fail_at_birth(run_id, format!("agent spawn failed: {e}")).await;
        }
        let stdout_rx = driver.take_stdout();
        let stderr_rx = driver.take_stderr();

        let cancel_token = CancellationToken::new();
        self.running.lock().insert(run_id, cancel_token.clone());

        if let Some(rx) = stdout_rx {
            self.spawn_output_pump(run_id, rx, EventKind::Stdout);
        }
        if let Some(rx) = stderr_rx {
            self.spawn_output_pump(run_id, rx, EventKind::Stderr);
        }
        self.spawn_supervisor(run_id, driver, cancel_token);

        let run = self.runs.get(run_id).await.map_err(map_storage_err)?;
        // Allow expect here: we hold no lock releasing the run between our
        // own insert (in start_run's caller) and this read, so it cannot
        // have vanished.
        #[allow(clippy::expect_used)]
        let run = run.expect("just inserted");
        Ok(run)
    }

    /// Records a `run_failed` event and transitions straight to `failed`
    /// when the run never got past workspace creation or driver spawn
    /// (spec §4.7 step 3). The run itself is still returned, not an error.
    async fn fail_at_birth(self: &Arc<Self>, run_id: RunId, reason: String) -> Result<Run, KernelError> {
        self.event_log.append(run_id, EventKind::RunFailed, serde_json::json!({"error": reason})).await?;
        apply_transition(&self.runs, &self.hub, &self.clock, run_id, RunTransition::Exited { success: false })
            .await?;
        let run = self.runs.get(run_id).await.map_err(map_storage_err)?;
        // Allow expect here: same invariant as above — the run was just
        // inserted and nothing deletes runs.
        #[allow(clippy::expect_used)]
        let run = run.expect("just inserted");
        Ok(run)
    }

    fn spawn_output_pump(self: &Arc<Self>, run_id: RunId, mut rx: tokio::sync::mpsc::Receiver<String>, kind: EventKind) {
        let event_log = self.event_log.clone();
        tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                let _ = event_log.append(run_id, kind, serde_json::json!({"text": chunk})).await;
            }
        });
    }

    /// The supervisor is the sole owner of the driver for the run's
    /// lifetime: it races `wait()` against the cancellation token so a
    /// `cancel_run` call never has to contend for a lock `wait()` is
    /// already holding for the life of the subprocess.
    fn spawn_supervisor(self: &Arc<Self>, run_id: RunId, mut driver: Box<dyn AgentDriver>, cancel_token: CancellationToken) {
        let manager = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = driver.wait() => outcome,
                _ = cancel_token.cancelled() => {
                    driver.cancel().await;
                    driver.wait().await
                }
            };
            let was_cancelled = cancel_token.is_cancelled();
            manager.handle_exit(run_id, outcome, was_cancelled, driver.as_mut()).await;
        });
    }

    /// Step 6 of spec §4.7: append the terminal event, transition state,
    /// cancel any still-pending interactions, and release the driver.
    async fn handle_exit(&self, run_id: RunId, outcome: ExitOutcome, was_cancelled: bool, driver: &mut dyn AgentDriver) {
        let (event_kind, transition, data) = if was_cancelled {
            (EventKind::RunCancelled, RunTransition::OperatorCancel, serde_json::json!({"reason": "user"}))
        } else {
            match outcome {
                ExitOutcome::Success => (EventKind::RunCompleted, RunTransition::Exited { success: true }, serde_json::json!({})),
                ExitOutcome::Failure(msg) => {
                    (EventKind::RunFailed, RunTransition::Exited { success: false }, serde_json::json!({"error": msg}))
                }
                ExitOutcome::Signaled(msg) => {
                    (EventKind::RunFailed, RunTransition::Exited { success: false }, serde_json::json!({"error": msg}))
                }
            }
        };

        if let Err(e) = self.event_log.append(run_id, event_kind, data).await {
            tracing::warn!(%run_id, error = %e, "failed to append terminal event");
        }
        if let Err(e) = apply_transition(&self.runs, &self.hub, &self.clock, run_id, transition).await {
            tracing::warn!(%run_id, error = %e, "failed to apply terminal transition");
        }
        if let Err(e) = self.interactions.cancel_for_run(run_id).await {
            tracing::warn!(%run_id, error = %e, "failed to cancel pending interactions");
        }

        self.running.lock().remove(&run_id);
        driver.close().await;
    }

    /// `CancelRun(id)` (spec §4.7). The terminal `run_cancelled` event and
    /// state transition happen asynchronously once the supervisor observes
    /// the driver exit — `cancel_run` only signals the driver.
    pub async fn cancel_run(&self, run_id: RunId) -> Result<(), KernelError> {
        let run = self
            .runs
            .get(run_id)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("run {run_id}")))?;
        if run.state.is_terminal() {
            return Err(KernelError::InvalidState(format!("run {run_id} is already {:?}", run.state)));
        }
        let token = self
            .running
            .lock()
            .get(&run_id)
            .cloned()
            .ok_or_else(|| KernelError::InvalidState(format!("run {run_id} has no active driver")))?;

        token.cancel();
        Ok(())
    }
}
