// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Shared run-state-transition plumbing used by both the Interaction
//! Coordinator and the Run Manager, so "apply this transition, persist it,
//! notify the hub" has exactly one implementation (spec §4.7's transition
//! table is the only thing that varies per call site).

use std::sync::Arc;

use pm_core::{Clock, KernelError, Run, RunId, RunTransition};
use pm_storage::RunStore;

use super::event_log::map_storage_err;
use super::hub::EventHub;

/// Applies `transition` to `run_id`'s current state, persists the result,
/// and publishes a `state` frame to any live subscribers. Fails with
/// `InvalidState` if the transition is not legal from the run's current
/// state (spec §4.7: "the only legal" transitions).
pub(crate) async fn apply_transition(
    runs: &Arc<dyn RunStore>,
    hub: &Arc<EventHub>,
    clock: &Arc<dyn Clock>,
    run_id: RunId,
    transition: RunTransition,
) -> Result<Run, KernelError> {
    let run = runs
        .get(run_id)
        .await
        .map_err(map_storage_err)?
        .ok_or_else(|| KernelError::NotFound(format!("run {run_id}")))?;
    let next = run.state.transition(transition).ok_or_else(|| {
        KernelError::InvalidState(format!("cannot apply {transition:?} to run {run_id} in state {:?}", run.state))
    })?;
    let updated = runs
        .update_state(run_id, next, clock.now())
        .await
        .map_err(map_storage_err)?
        .ok_or_else(|| KernelError::NotFound(format!("run {run_id}")))?;
    hub.publish_state(run_id, next).await;
    Ok(updated)
}
