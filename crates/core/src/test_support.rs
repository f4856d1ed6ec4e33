// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Shared test builders for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Event, EventId, EventKind, RepoId, Run, RunId};
use std::path::PathBuf;

pub fn fixed_time() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub fn test_run(repo_id: RepoId) -> Run {
    Run::new(repo_id, "do the thing", PathBuf::from("/tmp/workspaces/test"), fixed_time())
}

pub fn test_event(run_id: RunId, seq: u64, kind: EventKind, data: serde_json::Value) -> Event {
    Event { id: EventId::new(), run_id, seq, kind, data, created_at: fixed_time() }
}

/// Proptest strategies for core state-machine types.
#[cfg(any(test, feature = "test-support"))]
pub mod strategies {
    use crate::run::RunTransition;
    use proptest::prelude::*;

    pub fn arb_transition() -> impl Strategy<Value = RunTransition> {
        prop_oneof![
            Just(RunTransition::InputRequested),
            Just(RunTransition::ApprovalRequested),
            Just(RunTransition::InputReceived),
            any::<bool>().prop_map(|approved| RunTransition::ApprovalResolved { approved }),
            any::<bool>().prop_map(|success| RunTransition::Exited { success }),
            Just(RunTransition::OperatorCancel),
        ]
    }
}
