// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `/api/approvals` (spec §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use pm_core::ApprovalId;
use pm_wire::{ApprovalSummary, ResolveApprovalRequest};

use super::auth::check_operator_auth;
use super::error::{to_http, HttpError};
use super::AppState;

pub async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApprovalSummary>>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let approvals = state.facade.list_pending_approvals().await.map_err(|e| to_http(&e))?;
    Ok(Json(approvals.iter().map(ApprovalSummary::from).collect()))
}

pub async fn get_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<ApprovalId>,
) -> Result<Json<ApprovalSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let approval = state.facade.get_approval(id).await.map_err(|e| to_http(&e))?;
    Ok(Json(ApprovalSummary::from(&approval)))
}

pub async fn resolve_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<ApprovalId>,
    Json(req): Json<ResolveApprovalRequest>,
) -> Result<Json<ApprovalSummary>, HttpError> {
    check_operator_auth(&state, &headers)?;
    let approval = state
        .facade
        .resolve_approval(id, req.approved, req.reason)
        .await
        .map_err(|e| to_http(&e))?;
    Ok(Json(ApprovalSummary::from(&approval)))
}
