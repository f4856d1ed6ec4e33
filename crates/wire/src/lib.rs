// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Wire types shared by `pm-daemon`'s transport layer and `pm-cli`: HTTP
//! request/response bodies, the error envelope, and WebSocket frames (spec §6).
//! This crate defines shapes only — decoding bytes off a socket and picking
//! HTTP status codes is the transport layer's job, not this crate's.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod types;
mod ws;

pub use error::{ErrorBody, ErrorDetail};
pub use types::{
    ApprovalSummary, CreateRepoRequest, DeviceSummary, HookInteractionRequest,
    RegisterDeviceRequest, RepoSummary, ResolveApprovalRequest, RunSummary, SendInputRequest,
    StartRunRequest,
};
pub use ws::{parse_from_seq, ClientFrame, EventEnvelope, ServerFrame};
