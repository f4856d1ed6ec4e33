// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Workspace Manager (spec §4.3): the filesystem directory exclusively
//! owned by one run for that run's lifetime.

use std::path::PathBuf;
use std::time::Duration;

use pm_core::{Clock, RepoId, RunId};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory: {0}")]
    CreateFailed(String),
    #[error("clone failed: {0}")]
    CloneFailed(String),
}

pub struct WorkspaceManager {
    root: PathBuf,
    clock: std::sync::Arc<dyn Clock>,
    shallow_clone: bool,
    clone_timeout: Duration,
}

impl WorkspaceManager {
    pub fn new(root: PathBuf, clock: std::sync::Arc<dyn Clock>, shallow_clone: bool, clone_timeout: Duration) -> Self {
        Self { root, clock, shallow_clone, clone_timeout }
    }

    /// `Path(run_id) -> absolute_path` (spec §4.3).
    pub fn path(&self, run_id: RunId) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    /// `Create(run_id, repo_id, optional git_url) -> absolute_path` (spec
    /// §4.3). On clone failure the directory is removed before returning
    /// the error, so the run never sees a partially-cloned workspace.
    pub async fn create(&self, run_id: RunId, repo_id: RepoId, git_url: Option<&str>) -> Result<PathBuf, WorkspaceError> {
        let path = self.path(run_id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| WorkspaceError::CreateFailed(e.to_string()))?;

        if let Err(e) = self.write_metadata(&path, run_id, repo_id, git_url).await {
            let _ = tokio::fs::remove_dir_all(&path).await;
            return Err(e);
        }

        if let Some(url) = git_url {
            if let Err(e) = self.clone_into(&path, url).await {
                let _ = tokio::fs::remove_dir_all(&path).await;
                return Err(e);
            }
        }

        Ok(path)
    }

    /// `Cleanup(run_id)` (spec §4.3). Advisory: the run is retained for
    /// history regardless; only the workspace directory is removed. Callers
    /// (the Run Manager) are responsible for only invoking this on a
    /// terminal run.
    pub async fn cleanup(&self, run_id: RunId) -> Result<(), WorkspaceError> {
        let path = self.path(run_id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&path).await.map_err(|e| WorkspaceError::CreateFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Writes `<path>/.m/run.json`: the small metadata file spec §6
    /// specifies alongside the clone in every run's workspace directory.
    async fn write_metadata(
        &self,
        path: &std::path::Path,
        run_id: RunId,
        repo_id: RepoId,
        git_url: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        let metadata = serde_json::json!({
            "run_id": run_id.to_string(),
            "repo_id": repo_id.to_string(),
            "git_url": git_url,
            "created_at": self.clock.now().to_rfc3339(),
        });
        let dir = path.join(".m");
        tokio::fs::create_dir_all(&dir).await.map_err(|e| WorkspaceError::CreateFailed(e.to_string()))?;
        tokio::fs::write(dir.join("run.json"), metadata.to_string())
            .await
            .map_err(|e| WorkspaceError::CreateFailed(e.to_string()))
    }

    async fn clone_into(&self, path: &std::path::Path, url: &str) -> Result<(), WorkspaceError> {
        let mut cmd = Command::new("git");
        cmd.arg("clone");
        if self.shallow_clone {
            cmd.args(["--depth", "1"]);
        }
        cmd.arg(url).arg(path).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");

        let output = run_with_timeout(cmd, self.clone_timeout, "git clone").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkspaceError::CloneFailed(stderr.trim().to_string()));
        }
        Ok(())
    }
}

async fn run_with_timeout(mut cmd: Command, timeout: Duration, label: &str) -> Result<std::process::Output, WorkspaceError> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(WorkspaceError::CloneFailed(format!("{label}: {e}"))),
        Err(_) => Err(WorkspaceError::CloneFailed(format!("{label} timed out after {timeout:?}"))),
    }
}
