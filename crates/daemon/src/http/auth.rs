// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Bearer-token checks for the two audiences the transport serves: the hook
//! script (fixed token) and operator clients (`pm-cli`, dashboards).

use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use pm_wire::ErrorBody;

use super::AppState;

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn unauthorized() -> (StatusCode, Json<ErrorBody>) {
    let (status, detail) = ErrorBody::unauthorized();
    (StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED), Json(ErrorBody::new("unauthorized", detail)))
}

/// Checked on the hook endpoint only: the token the agent's hook script was
/// launched with (spec §4.4's `PM_HOOK_BEARER` env var).
pub fn check_hook_auth(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<ErrorBody>)> {
    match bearer(headers) {
        Some(token) if token == state.config.hook_token => Ok(()),
        _ => Err(unauthorized()),
    }
}

/// Checked on every operator-facing route. Absent `operator_token` in
/// config means the operator surface is unauthenticated (local dev only).
pub fn check_operator_auth(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<ErrorBody>)> {
    let Some(expected) = &state.config.operator_token else {
        return Ok(());
    };
    match bearer(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(unauthorized()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_has_no_bearer() {
        assert_eq!(bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn strips_the_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer(&headers), Some("abc123"));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer(&headers), None);
    }
}
