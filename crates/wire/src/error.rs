// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The error body shape returned by every HTTP endpoint (spec §6), and the
//! mapping from [`pm_core::KernelError`] to it plus an HTTP status code.

use pm_core::KernelError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: ErrorDetail { code: code.into(), message: message.into() } }
    }

    /// `(status_code, body)`, ready for a transport layer to hand to its
    /// response builder. Not a `From` impl: status codes are an axum/http
    /// concern this crate doesn't depend on.
    pub fn from_kernel_error(err: &KernelError) -> (u16, Self) {
        let status = match err {
            KernelError::InvalidInput(_) => 400,
            KernelError::NotFound(_) => 404,
            KernelError::InvalidState(_) => 409,
            KernelError::Conflict(_) => 409,
            KernelError::StorageUnavailable(_) => 503,
            KernelError::Internal(_) => 500,
        };
        (status, Self::new(err.code(), err.message()))
    }

    pub const fn unauthorized() -> (u16, &'static str) {
        (401, "unauthorized")
    }
}
