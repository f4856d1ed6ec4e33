// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Run identity, state, and the state machine's transition table (spec §4.7).

use crate::repo::RepoId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a run.
    pub struct RunId("run-");
}

/// A run's position in its lifecycle.
///
/// `Completed`, `Failed`, and `Cancelled` are terminal: [`RunState::transition`]
/// rejects every event offered to a run already in one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    WaitingInput,
    WaitingApproval,
    Completed,
    Failed,
    Cancelled,
}

/// The event that drives a state transition. Kept separate from [`crate::event::EventKind`]
/// because not every appended event causes a state change (e.g. `stdout` doesn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTransition {
    InputRequested,
    ApprovalRequested,
    InputReceived,
    ApprovalResolved { approved: bool },
    Exited { success: bool },
    OperatorCancel,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Apply a transition, returning the resulting state or `None` if the
    /// transition is not legal from the current state.
    ///
    /// This is the single source of truth for spec §4.7's transition table;
    /// every state change in the Run Manager goes through this function so
    /// `invalid_state` is deterministic rather than scattered across call sites.
    pub fn transition(self, event: RunTransition) -> Option<RunState> {
        use RunState::*;
        use RunTransition::*;
        match (self, event) {
            (Running, InputRequested) => Some(WaitingInput),
            (Running, ApprovalRequested) => Some(WaitingApproval),
            (WaitingInput, InputReceived) => Some(Running),
            (WaitingApproval, ApprovalResolved { approved: true }) => Some(Running),
            (WaitingApproval, ApprovalResolved { approved: false }) => Some(Failed),
            (Running, Exited { success: true }) => Some(Completed),
            (Running, Exited { success: false })
            | (WaitingInput, Exited { .. })
            | (WaitingApproval, Exited { .. }) => Some(Failed),
            (Running, OperatorCancel)
            | (WaitingInput, OperatorCancel)
            | (WaitingApproval, OperatorCancel) => Some(Cancelled),
            // Terminal states and every other combination are illegal.
            _ if self.is_terminal() => None,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub repo_id: RepoId,
    pub prompt: String,
    pub state: RunState,
    pub workspace_path: PathBuf,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Run {
    pub fn new(
        repo_id: RepoId,
        prompt: impl Into<String>,
        workspace_path: PathBuf,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: RunId::new(),
            repo_id,
            prompt: prompt.into(),
            state: RunState::Running,
            workspace_path,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[yare::parameterized(
        running_to_waiting_input = { RunState::Running, RunTransition::InputRequested, Some(RunState::WaitingInput) },
        running_to_waiting_approval = { RunState::Running, RunTransition::ApprovalRequested, Some(RunState::WaitingApproval) },
        waiting_input_back_to_running = { RunState::WaitingInput, RunTransition::InputReceived, Some(RunState::Running) },
        waiting_approval_approved_to_running = { RunState::WaitingApproval, RunTransition::ApprovalResolved { approved: true }, Some(RunState::Running) },
        waiting_approval_rejected_to_failed = { RunState::WaitingApproval, RunTransition::ApprovalResolved { approved: false }, Some(RunState::Failed) },
        running_exit_success_to_completed = { RunState::Running, RunTransition::Exited { success: true }, Some(RunState::Completed) },
        running_exit_failure_to_failed = { RunState::Running, RunTransition::Exited { success: false }, Some(RunState::Failed) },
        running_cancel_to_cancelled = { RunState::Running, RunTransition::OperatorCancel, Some(RunState::Cancelled) },
        waiting_input_cancel_to_cancelled = { RunState::WaitingInput, RunTransition::OperatorCancel, Some(RunState::Cancelled) },
        completed_rejects_everything = { RunState::Completed, RunTransition::OperatorCancel, None },
        failed_rejects_everything = { RunState::Failed, RunTransition::InputReceived, None },
        cancelled_rejects_everything = { RunState::Cancelled, RunTransition::Exited { success: true }, None },
        running_cannot_receive_input = { RunState::Running, RunTransition::InputReceived, None },
        waiting_input_cannot_resolve_approval = { RunState::WaitingInput, RunTransition::ApprovalResolved { approved: true }, None },
    )]
    fn transition_table(from: RunState, event: RunTransition, expected: Option<RunState>) {
        assert_eq!(from.transition(event), expected);
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for state in [RunState::Completed, RunState::Failed, RunState::Cancelled] {
            for event in [
                RunTransition::InputRequested,
                RunTransition::ApprovalRequested,
                RunTransition::InputReceived,
                RunTransition::ApprovalResolved { approved: true },
                RunTransition::ApprovalResolved { approved: false },
                RunTransition::Exited { success: true },
                RunTransition::Exited { success: false },
                RunTransition::OperatorCancel,
            ] {
                assert_eq!(state.transition(event), None, "{state:?} + {event:?} should be illegal");
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn terminal_states_reject_any_transition(event in crate::test_support::strategies::arb_transition()) {
            for state in [RunState::Completed, RunState::Failed, RunState::Cancelled] {
                prop_assert_eq!(state.transition(event), None);
            }
        }
    }
}
