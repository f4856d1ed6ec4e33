// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The error taxonomy surfaced by every Kernel Façade operation (spec §7).

use thiserror::Error;

/// Errors the Kernel Façade can return to its caller (the HTTP/WS transport
/// layer, or an in-process test harness).
///
/// Transport layers map each variant to the status code documented at the
/// call site; `pm-daemon::http::error` does this for the HTTP surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Malformed caller data (e.g. an empty prompt). Maps to HTTP 400.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown id. Maps to HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation disallowed in the current run/interaction state. Maps to HTTP 409.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Attempted to start a second active run on a repo. Maps to HTTP 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient storage failure; caller may retry. Maps to HTTP 503.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Bug or unexpected subsystem failure. Maps to HTTP 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KernelError {
    /// The stable machine-readable code used in the `{"error":{"code",...}}` body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
