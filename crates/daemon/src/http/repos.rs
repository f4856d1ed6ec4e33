// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `/api/repos` (spec §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use pm_core::RepoId;
use pm_wire::{CreateRepoRequest, RepoSummary};

use super::auth::check_operator_auth;
use super::error::{to_http, HttpError};
use super::AppState;

pub async fn create_repo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRepoRequest>,
) -> Result<Json<RepoSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let repo = state.facade.create_repo(req.name, req.git_url).await.map_err(|e| to_http(&e))?;
    Ok(Json(RepoSummary::from(&repo)))
}

pub async fn list_repos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RepoSummary>>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let repos = state.facade.list_repos().await.map_err(|e| to_http(&e))?;
    Ok(Json(repos.iter().map(RepoSummary::from).collect()))
}

pub async fn get_repo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RepoId>,
) -> Result<Json<RepoSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let repo = state.facade.get_repo(id).await.map_err(|e| to_http(&e))?;
    Ok(Json(RepoSummary::from(&repo)))
}

pub async fn delete_repo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RepoId>,
) -> Result<(), HttpError> {
    check_operator_auth(&state, &headers)?;
    state.facade.delete_repo(id).await.map_err(|e| to_http(&e))
}
