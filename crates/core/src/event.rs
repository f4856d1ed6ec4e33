// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Append-only event record (spec §3) and its closed set of kinds.

use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an event.
    pub struct EventId("evt-");
}

/// The closed set of event types a run can produce.
///
/// Serializes with `{"type": "...", ...}` tagging, matching the wire shape
/// documented in spec §6. Unknown tags deserialize to `Custom` so the kernel
/// degrades gracefully if a future agent emits a type this build doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    Stdout,
    Stderr,
    ToolCallStart,
    ToolCallEnd,
    ApprovalRequested,
    ApprovalResolved,
    InputRequested,
    InputReceived,
    RunCompleted,
    RunFailed,
    RunCancelled,
    #[serde(other)]
    Custom,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run_started",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::ToolCallStart => "tool_call_start",
            Self::ToolCallEnd => "tool_call_end",
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalResolved => "approval_resolved",
            Self::InputRequested => "input_requested",
            Self::InputReceived => "input_received",
            Self::RunCompleted => "run_completed",
            Self::RunFailed => "run_failed",
            Self::RunCancelled => "run_cancelled",
            Self::Custom => "custom",
        }
    }
}

/// An append-only record of something that happened in a run.
///
/// Invariants (enforced by the Event Log, not this type): `(run_id, seq)` is
/// unique; for a given run, `seq` values form the contiguous range `1..=N`;
/// events are never mutated or deleted while the run is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub run_id: RunId,
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_snake_case() {
        let kinds = [
            EventKind::RunStarted,
            EventKind::Stdout,
            EventKind::Stderr,
            EventKind::ToolCallStart,
            EventKind::ToolCallEnd,
            EventKind::ApprovalRequested,
            EventKind::ApprovalResolved,
            EventKind::InputRequested,
            EventKind::InputReceived,
            EventKind::RunCompleted,
            EventKind::RunFailed,
            EventKind::RunCancelled,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let back: EventKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn unknown_type_tag_deserializes_to_custom() {
        let back: EventKind = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(back, EventKind::Custom);
    }
}
