// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `/api/devices` (spec §6). Device registration has no state-machine or
//! ordering concerns, so the transport layer stamps `created_at` itself
//! rather than routing through the kernel's `Clock`.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use pm_core::Device;
use pm_wire::RegisterDeviceRequest;

use super::auth::check_operator_auth;
use super::error::{to_http, HttpError};
use super::AppState;

pub async fn register_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<(), HttpError> {
    check_operator_auth(&state, &headers)?;
    let device = Device { token: req.token, platform: req.platform, created_at: chrono::Utc::now() };
    state.facade.register_device(device).await.map_err(|e| to_http(&e))
}

pub async fn unregister_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<(), HttpError> {
    check_operator_auth(&state, &headers)?;
    state.facade.unregister_device(&token).await.map_err(|e| to_http(&e))
}
