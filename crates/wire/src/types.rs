// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Request and response bodies for the REST surface (spec §6).

use pm_core::{
    Approval, ApprovalId, ApprovalKind, ApprovalState, Device, DevicePlatform, Repo, RepoId, Run,
    RunId, RunState,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRepoRequest {
    pub name: String,
    #[serde(default)]
    pub git_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoSummary {
    pub id: RepoId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Repo> for RepoSummary {
    fn from(r: &Repo) -> Self {
        Self { id: r.id, name: r.name.clone(), git_url: r.git_url.clone(), created_at: r.created_at }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartRunRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendInputRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub id: RunId,
    pub repo_id: RepoId,
    pub prompt: String,
    pub state: RunState,
    pub workspace_path: std::path::PathBuf,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Run> for RunSummary {
    fn from(r: &Run) -> Self {
        Self {
            id: r.id,
            repo_id: r.repo_id,
            prompt: r.prompt.clone(),
            state: r.state,
            workspace_path: r.workspace_path.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveApprovalRequest {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalSummary {
    pub id: ApprovalId,
    pub run_id: RunId,
    pub kind: ApprovalKind,
    pub state: ApprovalState,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&Approval> for ApprovalSummary {
    fn from(a: &Approval) -> Self {
        Self {
            id: a.id,
            run_id: a.run_id,
            kind: a.kind,
            state: a.state,
            payload: a.payload.clone(),
            rejection_reason: a.rejection_reason.clone(),
            created_at: a.created_at,
            resolved_at: a.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDeviceRequest {
    pub token: String,
    pub platform: DevicePlatform,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSummary {
    pub token: String,
    pub platform: DevicePlatform,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Device> for DeviceSummary {
    fn from(d: &Device) -> Self {
        Self { token: d.token.clone(), platform: d.platform, created_at: d.created_at }
    }
}

/// Body of `POST /api/internal/interaction-request` (spec §6). `request_id`
/// also arrives as the `X-M-Request-ID` header; the transport layer is
/// responsible for reconciling the two (and rejecting a mismatch) before
/// this reaches the kernel.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInteractionRequest {
    pub run_id: RunId,
    #[serde(rename = "type")]
    pub kind: pm_core::InteractionKind,
    pub tool: String,
    pub request_id: String,
    pub payload: serde_json::Value,
}
