// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Domain types shared by every Project M crate.
//!
//! Nothing in this crate talks to a filesystem, a subprocess, or a socket —
//! it is the vocabulary the kernel (`pm-daemon`), the storage contract
//! (`pm-storage`), and the wire layer (`pm-wire`) all build on.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod approval;
pub mod clock;
pub mod device;
pub mod error;
pub mod event;
pub mod id;
pub mod interaction;
pub mod repo;
pub mod run;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use approval::{Approval, ApprovalId, ApprovalKind, ApprovalState};
pub use clock::{Clock, FakeClock, SystemClock};
pub use device::{Device, DevicePlatform};
pub use error::{KernelError, KernelResult};
pub use event::{Event, EventId, EventKind};
pub use interaction::{Decision, Interaction, InteractionId, InteractionKind, InteractionState};
pub use repo::{Repo, RepoId};
pub use run::{Run, RunId, RunState, RunTransition};
