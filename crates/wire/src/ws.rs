// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Frame shapes for the per-run event WebSocket (spec §6).

use pm_core::{Event, EventId, EventKind, RunState};
use serde::{Deserialize, Serialize};

/// An event as it appears on the wire: the same fields as [`pm_core::Event`],
/// just with `kind` renamed to the wire's `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub id: EventId,
    pub seq: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Event> for EventEnvelope {
    fn from(e: &Event) -> Self {
        Self { id: e.id, seq: e.seq, kind: e.kind, data: e.data.clone(), created_at: e.created_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Event { event: EventEnvelope },
    State { state: RunState },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Pong,
}

/// Parse the `from_seq` query parameter: absent or `0` both mean "replay
/// from the beginning" (spec §6).
pub fn parse_from_seq(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse::<u64>().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_round_trips() {
        let envelope = EventEnvelope {
            id: EventId::new(),
            seq: 3,
            kind: EventKind::Stdout,
            data: serde_json::json!({"text": "hi"}),
            created_at: chrono::Utc::now(),
        };
        let frame = ServerFrame::Event { event: envelope };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["type"], "stdout");
        let back: ServerFrame = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn state_frame_serializes_bare_state() {
        let frame = ServerFrame::State { state: RunState::WaitingApproval };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"type": "state", "state": "waiting_approval"}));
    }

    #[test]
    fn ping_has_no_extra_fields() {
        let json = serde_json::to_value(ServerFrame::Ping).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ping"}));
    }

    #[test]
    fn client_pong_round_trips() {
        let json = serde_json::to_value(ClientFrame::Pong).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong"}));
        let back: ClientFrame = serde_json::from_value(json).unwrap();
        assert_eq!(back, ClientFrame::Pong);
    }

    #[yare::parameterized(
        absent = { None, 0 },
        zero = { Some("0"), 0 },
        five = { Some("5"), 5 },
        garbage_defaults_to_zero = { Some("nope"), 0 },
    )]
    fn from_seq_parses_as_documented(raw: Option<&str>, expected: u64) {
        assert_eq!(parse_from_seq(raw), expected);
    }
}
