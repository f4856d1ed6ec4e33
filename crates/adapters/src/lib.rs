// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Process and notification adapters: the Agent Driver (spec §4.4) and the
//! Escalation Tracker's notification callback (spec §4.8).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod driver;
mod escalation_sink;

pub use driver::{
    AgentDriver, AgentDriverError, DriverConfig, ExitOutcome, HookConfig, LocalDriver, OutputChunk,
};
pub use escalation_sink::{Escalation, EscalationSink, EscalationSinkError, LoggingEscalationSink};

#[cfg(any(test, feature = "test-support"))]
pub use driver::{FakeCall, FakeDriver};
#[cfg(any(test, feature = "test-support"))]
pub use escalation_sink::FakeEscalationSink;
