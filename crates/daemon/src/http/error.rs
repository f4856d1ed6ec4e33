// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Maps [`pm_core::KernelError`] to an HTTP status and JSON error body
//! (spec §6, §7). The status/code mapping itself lives in `pm-wire` so
//! `pm-cli` can decode the same body without depending on axum; this module
//! just turns that into something an axum handler can return.

use axum::http::StatusCode;
use axum::Json;
use pm_core::KernelError;
use pm_wire::ErrorBody;

pub type HttpError = (StatusCode, Json<ErrorBody>);

pub fn to_http(err: &KernelError) -> HttpError {
    let (status, body) = ErrorBody::from_kernel_error(err);
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let (status, Json(body)) = to_http(&KernelError::NotFound("run".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "not_found");
    }
}
