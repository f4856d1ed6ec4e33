// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Event Log's storage contract (spec §4.1).
//!
//! This crate only provides the primitive the Event Log is built from:
//! a conditional insert keyed on `(run_id, seq)`. The retry-on-conflict
//! algorithm and the per-run append serialization live in the kernel
//! (`pm-daemon::kernel::event_log`), which is the sole caller of `insert`.

use async_trait::async_trait;
use pm_core::{Event, EventId, EventKind, RunId};

use crate::error::StorageError;

#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Insert an event at exactly `seq`, failing with [`StorageError::SeqConflict`]
    /// if `(run_id, seq)` is already taken.
    async fn insert(
        &self,
        run_id: RunId,
        seq: u64,
        kind: EventKind,
        data: serde_json::Value,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Event, StorageError>;

    /// The highest `seq` recorded for `run_id`, or 0 if none.
    async fn latest_seq(&self, run_id: RunId) -> Result<u64, StorageError>;

    /// All events for `run_id` with `seq > since_seq`, in increasing `seq` order.
    async fn list_since(&self, run_id: RunId, since_seq: u64) -> Result<Vec<Event>, StorageError>;

    /// Look an event up by id (used to populate `Approval::event_id` projections).
    async fn get(&self, id: EventId) -> Result<Option<Event>, StorageError>;
}
