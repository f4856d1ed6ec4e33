// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `POST /api/internal/interaction-request` (spec §6): the hook script's
//! only endpoint. Reconciles the `X-M-Request-ID` header against the body's
//! `request_id` before handing the call to the Interaction Coordinator.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use pm_core::Decision;
use pm_wire::{ErrorBody, HookInteractionRequest};

use super::auth::check_hook_auth;
use super::error::{to_http, HttpError};
use super::AppState;

const REQUEST_ID_HEADER: &str = "x-m-request-id";

pub async fn interaction_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<HookInteractionRequest>,
) -> Result<Json<Decision>, HttpError> {
    check_hook_auth(&state, &headers)?;

    if let Some(header_id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        if header_id != req.request_id {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("invalid_input", "X-M-Request-ID header does not match body request_id")),
            ));
        }
    }

    let decision = state
        .facade
        .hook_interaction(&req.request_id, req.run_id, req.kind, &req.tool, req.payload, state.config.hook_timeout)
        .await
        .map_err(|e| to_http(&e))?;
    Ok(Json(decision))
}
