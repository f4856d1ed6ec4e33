// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Approval persistence (spec §3): the user-visible projection of a
//! pending/resolved approval-type interaction.

use async_trait::async_trait;
use pm_core::{Approval, ApprovalId, ApprovalState, RunId};

use crate::error::StorageError;

#[async_trait]
pub trait ApprovalStore: Send + Sync + 'static {
    async fn insert(&self, approval: Approval) -> Result<(), StorageError>;

    async fn get(&self, id: ApprovalId) -> Result<Option<Approval>, StorageError>;

    async fn get_by_interaction(
        &self,
        interaction_id: pm_core::InteractionId,
    ) -> Result<Option<Approval>, StorageError>;

    async fn resolve(
        &self,
        id: ApprovalId,
        state: ApprovalState,
        rejection_reason: Option<String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Approval>, StorageError>;

    async fn list_pending(&self) -> Result<Vec<Approval>, StorageError>;

    async fn list_pending_for_run(&self, run_id: RunId) -> Result<Vec<Approval>, StorageError>;
}
