// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Run persistence, plus the per-repo "at most one active run" check
//! (spec §3). The storage layer provides the truthful check; the Run
//! Manager still serializes `StartRun` under a process-local lock so the
//! check-then-insert is atomic (spec §4.7 step 1).

use async_trait::async_trait;
use pm_core::{Run, RunId, RunState};

use crate::error::StorageError;

#[async_trait]
pub trait RunStore: Send + Sync + 'static {
    async fn insert(&self, run: Run) -> Result<(), StorageError>;

    async fn get(&self, id: RunId) -> Result<Option<Run>, StorageError>;

    async fn update_state(
        &self,
        id: RunId,
        state: RunState,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Run>, StorageError>;

    async fn list_by_repo(&self, repo_id: pm_core::RepoId) -> Result<Vec<Run>, StorageError>;

    /// Is there a non-terminal run for this repo, and if so which one?
    async fn active_run_for_repo(&self, repo_id: pm_core::RepoId) -> Result<Option<RunId>, StorageError>;
}
