// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Event Log (spec §4.1): the sole writer of `seq`, retrying once on a
//! lost race, then publishing to the Event Hub once the append is durable.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pm_core::{Clock, Event, EventId, EventKind, KernelError, RunId};
use pm_storage::{EventStore, StorageError};
use tokio::sync::Mutex as AsyncMutex;

use super::hub::EventHub;

pub struct EventLog {
    store: Arc<dyn EventStore>,
    hub: Arc<EventHub>,
    clock: Arc<dyn Clock>,
    /// Per-run append lock (spec §5 "Per-run mutex for Event Log appends").
    locks: Mutex<HashMap<RunId, Arc<AsyncMutex<()>>>>,
}

impl EventLog {
    pub fn new(store: Arc<dyn EventStore>, hub: Arc<EventHub>, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock, locks: Mutex::new(HashMap::new()) }
    }

    fn lock_for(&self, run_id: RunId) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(run_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `Append(run_id, type, data) -> Event` (spec §4.1). Computes
    /// `next_seq` and inserts under the per-run lock; retries exactly once
    /// if another append won the race for that `seq`, then publishes to
    /// the hub once durable.
    pub async fn append(
        &self,
        run_id: RunId,
        kind: EventKind,
        data: serde_json::Value,
    ) -> Result<Event, KernelError> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let next_seq = self.store.latest_seq(run_id).await.map_err(map_storage_err)? + 1;
            match self.store.insert(run_id, next_seq, kind, data.clone(), self.clock.now()).await {
                Ok(event) => {
                    self.hub.publish(event.clone()).await;
                    return Ok(event);
                }
                Err(StorageError::SeqConflict { .. }) if attempts < 2 => continue,
                Err(e) => return Err(map_storage_err(e)),
            }
        }
    }

    pub async fn list_since(&self, run_id: RunId, since_seq: u64) -> Result<Vec<Event>, KernelError> {
        self.store.list_since(run_id, since_seq).await.map_err(map_storage_err)
    }

    pub async fn latest_seq(&self, run_id: RunId) -> Result<u64, KernelError> {
        self.store.latest_seq(run_id).await.map_err(map_storage_err)
    }

    pub async fn get(&self, id: EventId) -> Result<Option<Event>, KernelError> {
        self.store.get(id).await.map_err(map_storage_err)
    }
}

pub(crate) fn map_storage_err(err: StorageError) -> KernelError {
    match err {
        StorageError::SeqConflict { run_id, seq } => {
            KernelError::Internal(format!("unresolved seq conflict for run {run_id} at seq {seq}"))
        }
        StorageError::Unavailable(msg) => KernelError::StorageUnavailable(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::test_support::fixed_time;
    use pm_core::SystemClock;
    use pm_storage::MemoryStore;

    fn new_log() -> EventLog {
        let store: Arc<dyn EventStore> = Arc::new(MemoryStore::new());
        let hub = Arc::new(EventHub::new(store.clone()));
        EventLog::new(store, hub, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn appends_are_gap_free_and_in_order() {
        let log = new_log();
        let run_id = RunId::new();
        for i in 1..=5u64 {
            let event = log.append(run_id, EventKind::Stdout, serde_json::json!({"i": i})).await.unwrap();
            assert_eq!(event.seq, i);
        }
        let _ = fixed_time();
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_run_never_collide() {
        let log = Arc::new(new_log());
        let run_id = RunId::new();
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(run_id, EventKind::Stdout, serde_json::json!({"i": i})).await.unwrap()
            }));
        }
        let mut seqs: Vec<u64> = Vec::new();
        for h in handles {
            seqs.push(h.await.unwrap().seq);
        }
        seqs.sort_unstable();
        let expected: Vec<u64> = (1..=20).collect();
        assert_eq!(seqs, expected);
    }

    #[tokio::test]
    async fn concurrent_appends_to_distinct_runs_proceed_independently() {
        let log = Arc::new(new_log());
        let run_a = RunId::new();
        let run_b = RunId::new();
        let (a, b) = tokio::join!(
            log.append(run_a, EventKind::RunStarted, serde_json::json!({})),
            log.append(run_b, EventKind::RunStarted, serde_json::json!({})),
        );
        assert_eq!(a.unwrap().seq, 1);
        assert_eq!(b.unwrap().seq, 1);
    }
}
