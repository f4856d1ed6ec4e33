// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Storage-layer errors. These are narrower than [`pm_core::KernelError`] —
//! the kernel translates them at the boundary (a `SeqConflict` becomes a
//! retry, not an error the caller ever sees; `Unavailable` becomes
//! `KernelError::StorageUnavailable`).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Another append won the race for this `(run_id, seq)`. The Event Log
    /// recomputes `next_seq` and retries once (spec §4.1).
    #[error("seq {seq} already used for run {run_id}")]
    SeqConflict { run_id: String, seq: u64 },

    /// The backing store is transiently unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
