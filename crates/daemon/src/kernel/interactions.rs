// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Interaction Coordinator (spec §4.6): bridges long-polling hook HTTP
//! calls and operator decisions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pm_core::{
    Approval, ApprovalId, ApprovalKind, ApprovalState, Clock, Decision, EventKind, Interaction,
    InteractionId, InteractionKind, KernelError, RunId, RunTransition,
};
use pm_storage::{ApprovalStore, InteractionStore, RunStore};
use tokio::sync::oneshot;
use tokio::sync::Mutex as AsyncMutex;

use super::escalation::EscalationTracker;
use super::event_log::{map_storage_err, EventLog};
use super::hub::EventHub;
use super::transitions::apply_transition;

/// Fan-out waiters for a single interaction's resolution: concurrent retries
/// of the same `request_id` all subscribe here and are all woken together
/// (spec §4.6 step 1: "all wait on the same record").
type Waiters = HashMap<InteractionId, Vec<oneshot::Sender<Decision>>>;

pub struct InteractionCoordinator {
    interactions: Arc<dyn InteractionStore>,
    approvals: Arc<dyn ApprovalStore>,
    runs: Arc<dyn RunStore>,
    event_log: Arc<EventLog>,
    hub: Arc<EventHub>,
    clock: Arc<dyn Clock>,
    escalation: Arc<EscalationTracker>,
    waiters: Mutex<Waiters>,
    /// Per-run serialization between `request()`'s "insert approval/track
    /// escalation -> transition -> register waiter" sequence and
    /// `resolve_approval`/`send_input`/`cancel_for_run`'s "resolve ->
    /// transition -> wake" sequence, so neither can observe the other
    /// mid-way and drive the run into an `InvalidState` transition error.
    run_locks: Mutex<HashMap<RunId, Arc<AsyncMutex<()>>>>,
}

impl InteractionCoordinator {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        approvals: Arc<dyn ApprovalStore>,
        runs: Arc<dyn RunStore>,
        event_log: Arc<EventLog>,
        hub: Arc<EventHub>,
        clock: Arc<dyn Clock>,
        escalation: Arc<EscalationTracker>,
    ) -> Self {
        Self {
            interactions,
            approvals,
            runs,
            event_log,
            hub,
            clock,
            escalation,
            waiters: Mutex::new(HashMap::new()),
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    fn run_lock(&self, run_id: RunId) -> Arc<AsyncMutex<()>> {
        self.run_locks.lock().entry(run_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `Request(request_id, run_id, type, tool, payload, deadline) -> Decision`
    /// (spec §4.6 inbound contract).
    pub async fn request(
        &self,
        request_id: &str,
        run_id: RunId,
        kind: InteractionKind,
        tool: &str,
        payload: serde_json::Value,
        deadline: Duration,
    ) -> Result<Decision, KernelError> {
        if let Some(existing) = self
            .interactions
            .get_by_request_id(request_id)
            .await
            .map_err(map_storage_err)?
        {
            return self.join_or_return(existing, deadline).await;
        }

        let event_kind = match kind {
            InteractionKind::Approval => EventKind::ApprovalRequested,
            InteractionKind::Input => EventKind::InputRequested,
        };
        let event = self
            .event_log
            .append(run_id, event_kind, serde_json::json!({"tool": tool, "payload": payload}))
            .await?;

        let now = self.clock.now();
        let (interaction, created) = self
            .interactions
            .create_or_get(request_id, run_id, kind, tool, payload.clone(), event.id, now)
            .await
            .map_err(map_storage_err)?;

        if !created {
            // Lost the race to create: another caller's request_id beat us to
            // it. The event we just appended becomes an unreferenced audit
            // record; the interaction it would have belonged to already exists.
            return self.join_or_return(interaction, deadline).await;
        }

        // Everything from here through registering the waiter must commit
        // atomically with respect to a concurrent resolve_approval/send_input/
        // cancel_for_run: otherwise a resolver could see the approval we're
        // about to insert before the run has actually moved into its waiting
        // state, fail its own transition, and leave us waiting on a waiter
        // nothing will ever wake.
        let lock = self.run_lock(run_id);
        let rx = {
            let _guard = lock.lock().await;

            if kind == InteractionKind::Approval {
                let approval_id = ApprovalId::new();
                let approval = Approval {
                    id: approval_id,
                    run_id,
                    interaction_id: interaction.id,
                    event_id: event.id,
                    kind: infer_approval_kind(tool),
                    state: ApprovalState::Pending,
                    payload,
                    rejection_reason: None,
                    created_at: now,
                    resolved_at: None,
                };
                self.approvals.insert(approval).await.map_err(map_storage_err)?;
                self.escalation.track(approval_id, run_id);
            }

            let transition = match kind {
                InteractionKind::Approval => RunTransition::ApprovalRequested,
                InteractionKind::Input => RunTransition::InputRequested,
            };
            apply_transition(&self.runs, &self.hub, &self.clock, run_id, transition).await?;

            self.register_waiter(interaction.id)
        };

        self.await_decision(interaction.id, deadline, rx).await
    }

    async fn join_or_return(&self, interaction: Interaction, deadline: Duration) -> Result<Decision, KernelError> {
        if interaction.is_pending() {
            self.wait_for(interaction.id, deadline).await
        } else {
            Ok(interaction.decision.unwrap_or_else(|| Decision::block("resolved with no recorded decision")))
        }
    }

    fn register_waiter(&self, id: InteractionId) -> oneshot::Receiver<Decision> {
        let mut waiters = self.waiters.lock();
        let (tx, rx) = oneshot::channel();
        waiters.entry(id).or_default().push(tx);
        rx
    }

    async fn await_decision(
        &self,
        id: InteractionId,
        deadline: Duration,
        rx: oneshot::Receiver<Decision>,
    ) -> Result<Decision, KernelError> {
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(_)) => Ok(Decision::block("cancelled")),
            Err(_) => {
                let decision = Decision::block("timeout");
                self.complete_unresolved(id, decision.clone(), Some("timeout".to_string())).await;
                Ok(decision)
            }
        }
    }

    async fn wait_for(&self, id: InteractionId, deadline: Duration) -> Result<Decision, KernelError> {
        let rx = self.register_waiter(id);
        self.await_decision(id, deadline, rx).await
    }

    fn wake(&self, id: InteractionId, decision: &Decision) {
        if let Some(senders) = self.waiters.lock().remove(&id) {
            for tx in senders {
                let _ = tx.send(decision.clone());
            }
        }
    }

    /// Resolves an interaction that timed out or whose run died, on behalf
    /// of whichever waiter's timeout fired first; a racing explicit
    /// `resolve_approval`/`send_input` still wins cleanly because
    /// `InteractionStore::resolve` only transitions pending -> resolved once.
    async fn complete_unresolved(&self, id: InteractionId, decision: Decision, rejection_reason: Option<String>) {
        let now = self.clock.now();
        if let Ok(Some(interaction)) = self.interactions.resolve(id, decision.clone(), now).await {
            if interaction.kind == InteractionKind::Approval {
                if let Ok(Some(approval)) = self.approvals.get_by_interaction(id).await {
                    let _ = self
                        .approvals
                        .resolve(approval.id, ApprovalState::Rejected, rejection_reason, now)
                        .await;
                    self.escalation.untrack(approval.id);
                }
            }
        }
        self.wake(id, &decision);
    }

    /// `ResolveApproval(approval_id, approved, reason?)` (spec §4.6 outbound
    /// contract). Idempotent: resolving an already-resolved approval reports
    /// `not_found` for the caller that lost the race.
    pub async fn resolve_approval(
        &self,
        approval_id: ApprovalId,
        approved: bool,
        reason: Option<String>,
    ) -> Result<Approval, KernelError> {
        let approval = self
            .approvals
            .get(approval_id)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("approval {approval_id}")))?;
        if !approval.is_pending() {
            return Err(KernelError::NotFound(format!("approval {approval_id} already resolved")));
        }

        let lock = self.run_lock(approval.run_id);
        let _guard = lock.lock().await;

        // Re-read now that we hold the run's lock: the approval may have been
        // resolved (or the run's own request() completed its registration)
        // while we were waiting for it.
        let approval = self
            .approvals
            .get(approval_id)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("approval {approval_id}")))?;
        if !approval.is_pending() {
            return Err(KernelError::NotFound(format!("approval {approval_id} already resolved")));
        }

        let decision = if approved { Decision::allow() } else { Decision::block(reason.clone().unwrap_or_else(|| "rejected".to_string())) };
        let now = self.clock.now();
        let resolved = self
            .interactions
            .resolve(approval.interaction_id, decision.clone(), now)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("interaction {}", approval.interaction_id)))?;

        let state = if approved { ApprovalState::Approved } else { ApprovalState::Rejected };
        let resolved_approval = self
            .approvals
            .resolve(approval_id, state, reason, now)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("approval {approval_id}")))?;

        self.event_log
            .append(
                resolved.run_id,
                EventKind::ApprovalResolved,
                serde_json::json!({"approval_id": approval_id, "approved": approved}),
            )
            .await?;
        apply_transition(
            &self.runs,
            &self.hub,
            &self.clock,
            resolved.run_id,
            RunTransition::ApprovalResolved { approved },
        )
        .await?;

        self.escalation.untrack(approval_id);
        self.wake(approval.interaction_id, &decision);
        Ok(resolved_approval)
    }

    /// `SendInput(run_id, text)` (spec §4.6 outbound contract).
    pub async fn send_input(&self, run_id: RunId, text: String) -> Result<(), KernelError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().await;

        let pending = self.interactions.list_pending_for_run(run_id).await.map_err(map_storage_err)?;
        let interaction = pending
            .into_iter()
            .find(|i| i.kind == InteractionKind::Input)
            .ok_or_else(|| KernelError::InvalidState(format!("run {run_id} has no pending input request")))?;

        let decision = Decision::allow_with_response(text);
        let now = self.clock.now();
        self.interactions
            .resolve(interaction.id, decision.clone(), now)
            .await
            .map_err(map_storage_err)?
            .ok_or_else(|| KernelError::NotFound(format!("interaction {}", interaction.id)))?;

        self.event_log
            .append(run_id, EventKind::InputReceived, serde_json::json!({"interaction_id": interaction.id}))
            .await?;
        apply_transition(&self.runs, &self.hub, &self.clock, run_id, RunTransition::InputReceived).await?;

        self.wake(interaction.id, &decision);
        Ok(())
    }

    /// Cancels every pending interaction for `run_id` with `{block,
    /// message:"cancelled"}` (spec §4.6 step 3, run-cancelled/agent-died
    /// branch). Called by the Run Manager; does not itself transition the
    /// run, since the caller is already moving it to a terminal state.
    pub async fn cancel_for_run(&self, run_id: RunId) -> Result<(), KernelError> {
        let lock = self.run_lock(run_id);
        let _guard = lock.lock().await;

        let pending = self.interactions.list_pending_for_run(run_id).await.map_err(map_storage_err)?;
        let decision = Decision::block("cancelled");
        let now = self.clock.now();
        for interaction in pending {
            if self
                .interactions
                .resolve(interaction.id, decision.clone(), now)
                .await
                .map_err(map_storage_err)?
                .is_some()
            {
                if interaction.kind == InteractionKind::Approval {
                    if let Ok(Some(approval)) = self.approvals.get_by_interaction(interaction.id).await {
                        let _ = self
                            .approvals
                            .resolve(approval.id, ApprovalState::Rejected, Some("cancelled".to_string()), now)
                            .await;
                        self.escalation.untrack(approval.id);
                    }
                }
                self.wake(interaction.id, &decision);
            }
        }
        Ok(())
    }
}

fn infer_approval_kind(tool: &str) -> ApprovalKind {
    let lower = tool.to_ascii_lowercase();
    if lower.contains("diff") || lower.contains("edit") || lower.contains("write") || lower.contains("patch") {
        ApprovalKind::Diff
    } else if lower.contains("bash") || lower.contains("shell") || lower.contains("exec") || lower.contains("command") {
        ApprovalKind::Command
    } else {
        ApprovalKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_adapters::FakeEscalationSink;
    use pm_core::{RunState, SystemClock};
    use pm_storage::{EventStore, MemoryStore};
    use std::time::Duration as StdDuration;

    async fn new_coordinator() -> (InteractionCoordinator, Arc<dyn RunStore>, RunId) {
        let store = Arc::new(MemoryStore::new());
        let event_store: Arc<dyn EventStore> = store.clone();
        let hub = Arc::new(EventHub::new(event_store.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let event_log = Arc::new(EventLog::new(event_store, hub.clone(), clock.clone()));
        let runs: Arc<dyn RunStore> = store.clone();
        let escalation =
            Arc::new(EscalationTracker::new(Arc::new(FakeEscalationSink::new()), clock.clone(), vec![]));

        let repo_id = pm_core::RepoId::new();
        let run = pm_core::test_support::test_run(repo_id);
        let run_id = run.id;
        runs.insert(run).await.unwrap();

        let coordinator = InteractionCoordinator::new(
            store.clone(),
            store.clone(),
            runs.clone(),
            event_log,
            hub,
            clock,
            escalation,
        );
        (coordinator, runs, run_id)
    }

    #[tokio::test]
    async fn duplicate_request_id_joins_the_same_wait() {
        let (coordinator, _runs, run_id) = new_coordinator().await;
        let coordinator = Arc::new(coordinator);

        let c1 = coordinator.clone();
        let first = tokio::spawn(async move {
            c1.request("req-1", run_id, InteractionKind::Approval, "Edit", serde_json::json!({}), StdDuration::from_secs(5)).await
        });
        // Give the first call a moment to create the interaction before the retry joins it.
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let c2 = coordinator.clone();
        let second = tokio::spawn(async move {
            c2.request("req-1", run_id, InteractionKind::Approval, "Edit", serde_json::json!({}), StdDuration::from_secs(5)).await
        });

        let approvals = coordinator.approvals.list_pending().await.unwrap();
        assert_eq!(approvals.len(), 1);
        let approval_id = approvals[0].id;

        let resolved = coordinator.resolve_approval(approval_id, true, None).await.unwrap();
        assert_eq!(resolved.state, ApprovalState::Approved);

        assert_eq!(first.await.unwrap().unwrap(), Decision::allow());
        assert_eq!(second.await.unwrap().unwrap(), Decision::allow());
    }

    #[tokio::test]
    async fn rejecting_an_approval_returns_block_with_reason() {
        let (coordinator, _runs, run_id) = new_coordinator().await;
        let coordinator = Arc::new(coordinator);
        let c1 = coordinator.clone();
        let handle = tokio::spawn(async move {
            c1.request("req-2", run_id, InteractionKind::Approval, "Bash", serde_json::json!({"cmd": "rm -rf /"}), StdDuration::from_secs(5)).await
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let approvals = coordinator.approvals.list_pending().await.unwrap();
        let approval_id = approvals[0].id;
        coordinator.resolve_approval(approval_id, false, Some("too risky".to_string())).await.unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), Decision::block("too risky"));
    }

    #[tokio::test]
    async fn send_input_resolves_the_pending_input_interaction() {
        let (coordinator, runs, run_id) = new_coordinator().await;
        let coordinator = Arc::new(coordinator);
        let c1 = coordinator.clone();
        let handle = tokio::spawn(async move {
            c1.request("req-3", run_id, InteractionKind::Input, "AskUser", serde_json::json!({}), StdDuration::from_secs(5)).await
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        coordinator.send_input(run_id, "42".to_string()).await.unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), Decision::allow_with_response("42"));

        let run = runs.get(run_id).await.unwrap().unwrap();
        assert_eq!(run.state, RunState::Running);
    }

    #[tokio::test]
    async fn timeout_resolves_as_blocked_with_timeout_message() {
        let (coordinator, _runs, run_id) = new_coordinator().await;
        let decision = coordinator
            .request("req-4", run_id, InteractionKind::Input, "AskUser", serde_json::json!({}), StdDuration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(decision, Decision::block("timeout"));
    }

    /// Races `resolve_approval` against `request()` as tightly as possible
    /// (no fixed sleep to dodge the window): polls for the approval to
    /// appear and resolves it the instant it's visible, which used to be
    /// able to land before `request()` had transitioned the run or
    /// registered its waiter.
    #[tokio::test]
    async fn resolve_approval_racing_request_never_observes_an_invalid_state() {
        let (coordinator, runs, run_id) = new_coordinator().await;
        let coordinator = Arc::new(coordinator);

        let c1 = coordinator.clone();
        let handle = tokio::spawn(async move {
            c1.request("req-race", run_id, InteractionKind::Approval, "Edit", serde_json::json!({}), StdDuration::from_secs(5)).await
        });

        let approval_id = loop {
            let pending = coordinator.approvals.list_pending().await.unwrap();
            if let Some(approval) = pending.first() {
                break approval.id;
            }
            tokio::task::yield_now().await;
        };

        let resolved = coordinator.resolve_approval(approval_id, true, None).await.unwrap();
        assert_eq!(resolved.state, ApprovalState::Approved);
        assert_eq!(handle.await.unwrap().unwrap(), Decision::allow());

        let run = runs.get(run_id).await.unwrap().unwrap();
        assert_eq!(run.state, RunState::Running);
    }

    #[tokio::test]
    async fn cancel_for_run_unblocks_pending_interactions_as_cancelled() {
        let (coordinator, _runs, run_id) = new_coordinator().await;
        let coordinator = Arc::new(coordinator);
        let c1 = coordinator.clone();
        let handle = tokio::spawn(async move {
            c1.request("req-5", run_id, InteractionKind::Approval, "Edit", serde_json::json!({}), StdDuration::from_secs(5)).await
        });
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        coordinator.cancel_for_run(run_id).await.unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), Decision::block("cancelled"));
    }
}
