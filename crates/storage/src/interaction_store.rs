// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Interaction Store's storage contract (spec §4.2).

use async_trait::async_trait;
use pm_core::{Decision, EventId, Interaction, InteractionId, InteractionKind, RunId};

use crate::error::StorageError;

#[async_trait]
pub trait InteractionStore: Send + Sync + 'static {
    /// Idempotent in `request_id`: the first call inserts and returns
    /// `(record, created: true)`; later calls with the same `request_id`
    /// return the existing record (possibly already resolved) with `created: false`.
    #[allow(clippy::too_many_arguments)]
    async fn create_or_get(
        &self,
        request_id: &str,
        run_id: RunId,
        kind: InteractionKind,
        tool: &str,
        payload: serde_json::Value,
        requested_event_id: EventId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(Interaction, bool), StorageError>;

    /// Transition `id` from pending to resolved exactly once. Returns
    /// `Ok(None)` if `id` is unknown or already resolved — the caller (the
    /// Interaction Coordinator) turns that into a `not_found` for the racer
    /// that lost.
    async fn resolve(
        &self,
        id: InteractionId,
        decision: Decision,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Interaction>, StorageError>;

    async fn get_by_request_id(&self, request_id: &str) -> Result<Option<Interaction>, StorageError>;

    async fn get(&self, id: InteractionId) -> Result<Option<Interaction>, StorageError>;

    /// All currently-pending interactions for a run (used to cancel them on
    /// run termination).
    async fn list_pending_for_run(&self, run_id: RunId) -> Result<Vec<Interaction>, StorageError>;
}
