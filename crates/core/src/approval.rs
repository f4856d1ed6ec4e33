// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The user-visible projection of an approval-type interaction (spec §3).

use crate::event::EventId;
use crate::interaction::InteractionId;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an approval.
    pub struct ApprovalId("apv-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Diff,
    Command,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub run_id: RunId,
    /// The interaction this approval is a projection of; resolving one
    /// resolves the other atomically (spec §3 invariant).
    pub interaction_id: InteractionId,
    pub event_id: EventId,
    pub kind: ApprovalKind,
    pub state: ApprovalState,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, ApprovalState::Pending)
    }
}
