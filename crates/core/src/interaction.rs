// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! A hook-originated blocking request (spec §3) and the decision it resolves to.

use crate::event::EventId;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an interaction record.
    pub struct InteractionId("itx-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Approval,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Pending,
    Resolved,
}

/// The outcome returned to a blocked hook caller (spec §4.6).
///
/// `Allow` with no response is an approved approval; `Allow` with a response
/// is delivered input; `Block` is a rejected approval or a cancelled/timed-out
/// wait, distinguished only by its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    Block {
        message: String,
    },
}

impl Decision {
    pub fn allow() -> Self {
        Self::Allow { response: None }
    }

    pub fn allow_with_response(response: impl Into<String>) -> Self {
        Self::Allow { response: Some(response.into()) }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self::Block { message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    /// Idempotency key supplied by the hook caller.
    pub request_id: String,
    pub run_id: RunId,
    pub kind: InteractionKind,
    /// Name of the intercepted tool (e.g. "Edit", "Bash").
    pub tool: String,
    pub payload: serde_json::Value,
    pub state: InteractionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// The event id of the paired `*_requested` event, for Approval projection.
    pub requested_event_id: EventId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Interaction {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, InteractionState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_allow_serializes_without_response_field() {
        let d = Decision::allow();
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "allow"}));
    }

    #[test]
    fn decision_allow_with_response_serializes_response_field() {
        let d = Decision::allow_with_response("42");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "allow", "response": "42"}));
    }

    #[test]
    fn decision_block_carries_message() {
        let d = Decision::block("timeout");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "block", "message": "timeout"}));
    }
}
