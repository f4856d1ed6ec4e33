// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Escalation Tracker (spec §4.8): an in-memory per-approval timer that
//! fires notification callbacks at configurable offsets. State is lost on
//! restart — acceptable for v0.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pm_adapters::{Escalation, EscalationSink};
use pm_core::{ApprovalId, Clock, RunId};

/// Hard cap on notification tiers per approval (spec §4.8: "capped at 3 total").
const MAX_TIERS: usize = 3;

struct Tracked {
    run_id: RunId,
    tier: u8,
    next_due: chrono::DateTime<chrono::Utc>,
}

pub struct EscalationTracker {
    sink: Arc<dyn EscalationSink>,
    clock: Arc<dyn Clock>,
    /// Offsets from tracking start for each tier, e.g. `[0s, 15m, 1h]`.
    offsets: Vec<Duration>,
    tracked: Mutex<HashMap<ApprovalId, Tracked>>,
}

impl EscalationTracker {
    pub fn new(sink: Arc<dyn EscalationSink>, clock: Arc<dyn Clock>, offsets: Vec<Duration>) -> Self {
        let offsets = offsets.into_iter().take(MAX_TIERS).collect();
        Self { sink, clock, offsets, tracked: Mutex::new(HashMap::new()) }
    }

    /// `Track(approval_id, run_id)` (spec §4.8).
    pub fn track(&self, approval_id: ApprovalId, run_id: RunId) {
        if self.offsets.is_empty() {
            return;
        }
        let next_due = self.clock.now() + chrono_duration(self.offsets[0]);
        self.tracked.lock().insert(approval_id, Tracked { run_id, tier: 0, next_due });
    }

    /// `Untrack(approval_id)` (spec §4.8). Idempotent.
    pub fn untrack(&self, approval_id: ApprovalId) {
        self.tracked.lock().remove(&approval_id);
    }

    /// One sweep pass: for every tracked entry whose `next_due` has arrived,
    /// advances its tier under the lock (so a concurrent sweep or an
    /// `untrack` racing a resolve can never double-fire a tier), then sends
    /// the notification outside the lock.
    pub async fn sweep(&self) {
        let now = self.clock.now();
        let due: Vec<Escalation> = {
            let mut tracked = self.tracked.lock();
            let mut due = Vec::new();
            let mut exhausted = Vec::new();
            for (approval_id, entry) in tracked.iter_mut() {
                if entry.next_due > now {
                    continue;
                }
                due.push(Escalation { approval_id: *approval_id, run_id: entry.run_id, tier: entry.tier });
                let next_tier = entry.tier as usize + 1;
                if next_tier >= self.offsets.len() {
                    exhausted.push(*approval_id);
                } else {
                    entry.tier = next_tier as u8;
                    entry.next_due = now + chrono_duration(self.offsets[next_tier]);
                }
            }
            for approval_id in exhausted {
                tracked.remove(&approval_id);
            }
            due
        };

        for escalation in due {
            if let Err(e) = self.sink.notify(&escalation).await {
                tracing::warn!(approval_id = %escalation.approval_id, error = %e, "escalation notify failed");
            }
        }
    }

    /// Spawns a background task that calls [`sweep`](Self::sweep) on a fixed
    /// cadence for the tracker's lifetime.
    pub fn spawn_sweep_loop(self: Arc<Self>, cadence: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}
