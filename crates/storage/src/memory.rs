// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! In-memory reference implementation of every storage trait in this crate.
//!
//! Per spec §1, persistent-storage mechanics beyond the operation contract
//! are an external collaborator's concern — a SQL-backed implementation is
//! the natural drop-in replacement for a real deployment, but isn't needed
//! to exercise or test the kernel, so it isn't built here (see DESIGN.md).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use pm_core::{
    Approval, ApprovalId, ApprovalState, Decision, Device, Event, EventId, EventKind, Interaction,
    InteractionId, InteractionKind, InteractionState, Repo, RepoId, Run, RunId, RunState,
};

use crate::approval_store::ApprovalStore;
use crate::error::StorageError;
use crate::event_store::EventStore;
use crate::interaction_store::InteractionStore;
use crate::repo_store::{DeviceStore, RepoStore};
use crate::run_store::RunStore;

#[derive(Default)]
struct Inner {
    events: HashMap<RunId, Vec<Event>>,
    events_by_id: HashMap<EventId, (RunId, usize)>,
    interactions: HashMap<InteractionId, Interaction>,
    interactions_by_request: HashMap<String, InteractionId>,
    runs: HashMap<RunId, Run>,
    active_run_by_repo: HashMap<RepoId, RunId>,
    approvals: HashMap<ApprovalId, Approval>,
    approvals_by_interaction: HashMap<pm_core::InteractionId, ApprovalId>,
    repos: HashMap<RepoId, Repo>,
    devices: HashMap<String, Device>,
}

/// An in-process, `Mutex`-guarded store. Cheap to clone (it's an `Arc` inside),
/// suitable for both production (v0 has no durability requirement beyond the
/// process lifetime) and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(
        &self,
        run_id: RunId,
        seq: u64,
        kind: EventKind,
        data: serde_json::Value,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Event, StorageError> {
        let mut inner = self.inner.lock();
        let list = inner.events.entry(run_id).or_default();
        if list.iter().any(|e| e.seq == seq) {
            return Err(StorageError::SeqConflict { run_id: run_id.to_string(), seq });
        }
        let event = Event { id: EventId::new(), run_id, seq, kind, data, created_at };
        list.push(event.clone());
        let idx = list.len() - 1;
        inner.events_by_id.insert(event.id, (run_id, idx));
        Ok(event)
    }

    async fn latest_seq(&self, run_id: RunId) -> Result<u64, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.events.get(&run_id).and_then(|l| l.last()).map(|e| e.seq).unwrap_or(0))
    }

    async fn list_since(&self, run_id: RunId, since_seq: u64) -> Result<Vec<Event>, StorageError> {
        let inner = self.inner.lock();
        let mut events: Vec<Event> = inner
            .events
            .get(&run_id)
            .map(|l| l.iter().filter(|e| e.seq > since_seq).cloned().collect())
            .unwrap_or_default();
        events.sort_by_key(|e| e.seq);
        Ok(events)
    }

    async fn get(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .events_by_id
            .get(&id)
            .and_then(|(run_id, idx)| inner.events.get(run_id).and_then(|l| l.get(*idx)).cloned()))
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn create_or_get(
        &self,
        request_id: &str,
        run_id: RunId,
        kind: InteractionKind,
        tool: &str,
        payload: serde_json::Value,
        requested_event_id: EventId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(Interaction, bool), StorageError> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.interactions_by_request.get(request_id).copied() {
            let existing = inner.interactions.get(&id).cloned().ok_or_else(|| {
                StorageError::Unavailable("interaction index out of sync".into())
            })?;
            return Ok((existing, false));
        }
        let record = Interaction {
            id: InteractionId::new(),
            request_id: request_id.to_string(),
            run_id,
            kind,
            tool: tool.to_string(),
            payload,
            state: InteractionState::Pending,
            decision: None,
            requested_event_id,
            created_at: now,
            resolved_at: None,
        };
        inner.interactions_by_request.insert(request_id.to_string(), record.id);
        inner.interactions.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn resolve(
        &self,
        id: InteractionId,
        decision: Decision,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Interaction>, StorageError> {
        let mut inner = self.inner.lock();
        let Some(record) = inner.interactions.get_mut(&id) else { return Ok(None) };
        if !record.is_pending() {
            return Ok(None);
        }
        record.state = InteractionState::Resolved;
        record.decision = Some(decision);
        record.resolved_at = Some(now);
        Ok(Some(record.clone()))
    }

    async fn get_by_request_id(&self, request_id: &str) -> Result<Option<Interaction>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .interactions_by_request
            .get(request_id)
            .and_then(|id| inner.interactions.get(id))
            .cloned())
    }

    async fn get(&self, id: InteractionId) -> Result<Option<Interaction>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.interactions.get(&id).cloned())
    }

    async fn list_pending_for_run(&self, run_id: RunId) -> Result<Vec<Interaction>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .interactions
            .values()
            .filter(|i| i.run_id == run_id && i.is_pending())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert(&self, run: Run) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if !run.state.is_terminal() {
            inner.active_run_by_repo.insert(run.repo_id, run.id);
        }
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn get(&self, id: RunId) -> Result<Option<Run>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.runs.get(&id).cloned())
    }

    async fn update_state(
        &self,
        id: RunId,
        state: RunState,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Run>, StorageError> {
        let mut inner = self.inner.lock();
        let Some(run) = inner.runs.get_mut(&id) else { return Ok(None) };
        run.state = state;
        run.updated_at = now;
        let updated = run.clone();
        if state.is_terminal() {
            if inner.active_run_by_repo.get(&updated.repo_id) == Some(&id) {
                inner.active_run_by_repo.remove(&updated.repo_id);
            }
        }
        Ok(Some(updated))
    }

    async fn list_by_repo(&self, repo_id: RepoId) -> Result<Vec<Run>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.runs.values().filter(|r| r.repo_id == repo_id).cloned().collect())
    }

    async fn active_run_for_repo(&self, repo_id: RepoId) -> Result<Option<RunId>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.active_run_by_repo.get(&repo_id).copied())
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn insert(&self, approval: Approval) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.approvals_by_interaction.insert(approval.interaction_id, approval.id);
        inner.approvals.insert(approval.id, approval);
        Ok(())
    }

    async fn get(&self, id: ApprovalId) -> Result<Option<Approval>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.approvals.get(&id).cloned())
    }

    async fn get_by_interaction(
        &self,
        interaction_id: pm_core::InteractionId,
    ) -> Result<Option<Approval>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .approvals_by_interaction
            .get(&interaction_id)
            .and_then(|id| inner.approvals.get(id))
            .cloned())
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        state: ApprovalState,
        rejection_reason: Option<String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Approval>, StorageError> {
        let mut inner = self.inner.lock();
        let Some(approval) = inner.approvals.get_mut(&id) else { return Ok(None) };
        approval.state = state;
        approval.rejection_reason = rejection_reason;
        approval.resolved_at = Some(now);
        Ok(Some(approval.clone()))
    }

    async fn list_pending(&self) -> Result<Vec<Approval>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.approvals.values().filter(|a| a.is_pending()).cloned().collect())
    }

    async fn list_pending_for_run(&self, run_id: RunId) -> Result<Vec<Approval>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.approvals.values().filter(|a| a.run_id == run_id && a.is_pending()).cloned().collect())
    }
}

#[async_trait]
impl RepoStore for MemoryStore {
    async fn insert(&self, repo: Repo) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.repos.insert(repo.id, repo);
        Ok(())
    }

    async fn get(&self, id: RepoId) -> Result<Option<Repo>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.repos.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Repo>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.repos.values().cloned().collect())
    }

    async fn delete(&self, id: RepoId) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        Ok(inner.repos.remove(&id).is_some())
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn upsert(&self, device: Device) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.devices.insert(device.token.clone(), device);
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock();
        Ok(inner.devices.remove(token).is_some())
    }

    async fn list(&self) -> Result<Vec<Device>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner.devices.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::test_support::fixed_time;

    fn run_id() -> RunId {
        RunId::new()
    }

    #[tokio::test]
    async fn insert_assigns_and_rejects_duplicate_seq() {
        let store = MemoryStore::new();
        let rid = run_id();
        let e1 = store.insert(rid, 1, EventKind::RunStarted, serde_json::json!({}), fixed_time()).await.unwrap();
        assert_eq!(e1.seq, 1);
        let conflict = store.insert(rid, 1, EventKind::Stdout, serde_json::json!({}), fixed_time()).await;
        assert!(matches!(conflict, Err(StorageError::SeqConflict { .. })));
    }

    #[tokio::test]
    async fn list_since_returns_strictly_greater_in_order() {
        let store = MemoryStore::new();
        let rid = run_id();
        for seq in 1..=5u64 {
            store.insert(rid, seq, EventKind::Stdout, serde_json::json!({"n": seq}), fixed_time()).await.unwrap();
        }
        let since_2 = EventStore::list_since(&store, rid, 2).await.unwrap();
        let seqs: Vec<u64> = since_2.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn interaction_create_or_get_is_idempotent_by_request_id() {
        let store = MemoryStore::new();
        let rid = run_id();
        let eid = EventId::new();
        let (a, created_a) = store
            .create_or_get("req-1", rid, InteractionKind::Approval, "Edit", serde_json::json!({}), eid, fixed_time())
            .await
            .unwrap();
        assert!(created_a);
        let (b, created_b) = store
            .create_or_get("req-1", rid, InteractionKind::Approval, "Edit", serde_json::json!({}), eid, fixed_time())
            .await
            .unwrap();
        assert!(!created_b);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn resolving_twice_returns_none_second_time() {
        let store = MemoryStore::new();
        let rid = run_id();
        let eid = EventId::new();
        let (itx, _) = store
            .create_or_get("req-2", rid, InteractionKind::Approval, "Edit", serde_json::json!({}), eid, fixed_time())
            .await
            .unwrap();
        let first = store.resolve(itx.id, Decision::allow(), fixed_time()).await.unwrap();
        assert!(first.is_some());
        let second = store.resolve(itx.id, Decision::allow(), fixed_time()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn at_most_one_active_run_per_repo() {
        let store = MemoryStore::new();
        let repo_id = RepoId::new();
        let run_a = pm_core::test_support::test_run(repo_id);
        let run_a_id = run_a.id;
        store.insert(run_a).await.unwrap();
        assert_eq!(RunStore::active_run_for_repo(&store, repo_id).await.unwrap(), Some(run_a_id));

        store.update_state(run_a_id, RunState::Completed, fixed_time()).await.unwrap();
        assert_eq!(RunStore::active_run_for_repo(&store, repo_id).await.unwrap(), None);

        let run_b = pm_core::test_support::test_run(repo_id);
        let run_b_id = run_b.id;
        store.insert(run_b).await.unwrap();
        assert_eq!(RunStore::active_run_for_repo(&store, repo_id).await.unwrap(), Some(run_b_id));
    }
}
