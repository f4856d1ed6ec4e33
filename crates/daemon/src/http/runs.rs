// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `/api/repos/{repo_id}/runs` and `/api/runs/{id}` (spec §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use pm_core::{RepoId, RunId};
use pm_wire::{RunSummary, SendInputRequest, StartRunRequest};

use super::auth::check_operator_auth;
use super::error::{to_http, HttpError};
use super::AppState;

pub async fn start_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(repo_id): Path<RepoId>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<RunSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let run = state.facade.start_run(repo_id, req.prompt).await.map_err(|e| to_http(&e))?;
    Ok(Json(RunSummary::from(&run)))
}

pub async fn list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(repo_id): Path<RepoId>,
) -> Result<Json<Vec<RunSummary>>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let runs = state.facade.list_runs_by_repo(repo_id).await.map_err(|e| to_http(&e))?;
    Ok(Json(runs.iter().map(RunSummary::from).collect()))
}

pub async fn get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RunId>,
) -> Result<Json<RunSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let run = state.facade.get_run(id).await.map_err(|e| to_http(&e))?;
    Ok(Json(RunSummary::from(&run)))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RunId>,
) -> Result<(), HttpError> {
    check_operator_auth(&state, &headers)?;
    state.facade.cancel_run(id).await.map_err(|e| to_http(&e))
}

pub async fn send_input(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RunId>,
    Json(req): Json<SendInputRequest>,
) -> Result<(), HttpError> {
    check_operator_auth(&state, &headers)?;
    state.facade.send_input(id, req.text).await.map_err(|e| to_http(&e))
}
