// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Notification delivery for the Escalation Tracker (spec §4.8). Push
//! delivery itself is an external collaborator's concern (spec §1); this
//! crate only defines the callback boundary the tracker invokes.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EscalationSinkError {
    #[error("notify failed: {0}")]
    Failed(String),
}

/// One escalation notification for a still-pending approval.
#[derive(Debug, Clone)]
pub struct Escalation {
    pub approval_id: pm_core::ApprovalId,
    pub run_id: pm_core::RunId,
    /// 0 = immediate, 1 = 15m, 2 = 1h (spec §4.8).
    pub tier: u8,
}

#[async_trait]
pub trait EscalationSink: Send + Sync + 'static {
    async fn notify(&self, escalation: &Escalation) -> Result<(), EscalationSinkError>;
}

/// Logs the escalation via `tracing` and otherwise does nothing. Reasonable
/// default until a real push adapter (APNs/FCM) is wired up (spec §1 —
/// push-notification delivery is out of scope for the kernel).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEscalationSink;

#[async_trait]
impl EscalationSink for LoggingEscalationSink {
    async fn notify(&self, escalation: &Escalation) -> Result<(), EscalationSinkError> {
        tracing::info!(
            approval_id = %escalation.approval_id,
            run_id = %escalation.run_id,
            tier = escalation.tier,
            "approval escalation"
        );
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Escalation, EscalationSink, EscalationSinkError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    pub struct FakeEscalationSink {
        calls: Arc<Mutex<Vec<Escalation>>>,
    }

    impl FakeEscalationSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Escalation> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl EscalationSink for FakeEscalationSink {
        async fn notify(&self, escalation: &Escalation) -> Result<(), EscalationSinkError> {
            self.calls.lock().push(escalation.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEscalationSink;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_sink_records_calls() {
        let sink = FakeEscalationSink::new();
        let escalation = Escalation {
            approval_id: pm_core::ApprovalId::new(),
            run_id: pm_core::RunId::new(),
            tier: 0,
        };
        sink.notify(&escalation).await.unwrap();
        assert_eq!(sink.calls().len(), 1);
    }
}
