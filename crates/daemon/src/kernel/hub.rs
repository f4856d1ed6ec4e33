// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Event Hub (spec §4.5): fans out appended events to live subscribers
//! with per-run seq-ordered delivery and replay.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pm_core::{Event, RunId, RunState};
use pm_storage::EventStore;
use tokio::sync::mpsc;

/// Depth of a subscriber's live queue before it is disconnected for overflow.
const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// A frame delivered to a subscriber. `Event` carries a `seq`; `State` and
/// `Ping` do not, and never compete with events for ordering.
#[derive(Debug, Clone)]
pub enum HubFrame {
    Event(Arc<Event>),
    State(RunState),
    Ping,
}

/// A subscriber starts `Buffering` (registered, but replay hasn't been sent
/// yet): frames published in this window are queued here rather than sent
/// straight to `tx`, so a live publish racing the replay fetch can never be
/// observed ahead of the replay events it logically follows. Once replay is
/// sent, [`EventHub::subscribe`] drains this buffer and flips the
/// subscriber to `Live`, after which `broadcast` sends straight to `tx`.
enum SubPhase {
    Buffering(Vec<HubFrame>),
    Live,
}

impl SubPhase {
    fn into_buffered(self) -> Vec<HubFrame> {
        match self {
            SubPhase::Buffering(frames) => frames,
            SubPhase::Live => Vec::new(),
        }
    }
}

struct Subscriber {
    tx: mpsc::Sender<HubFrame>,
    phase: SubPhase,
}

#[derive(Default)]
struct PerRun {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

pub struct EventHub {
    store: Arc<dyn EventStore>,
    runs: Mutex<HashMap<RunId, PerRun>>,
}

/// A handle to a live subscription. Dropping it (or calling [`Subscription::close`])
/// deregisters the subscriber; both are idempotent.
pub struct Subscription {
    run_id: RunId,
    id: u64,
    hub: Arc<EventHub>,
    pub rx: mpsc::Receiver<HubFrame>,
}

impl Subscription {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn close(self) {
        // Drop does the deregistration; this just makes intent explicit at call sites.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.deregister(self.run_id, self.id);
    }
}

impl EventHub {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store, runs: Mutex::new(HashMap::new()) }
    }

    /// `Subscribe(run_id, from_seq) -> Subscription` (spec §4.5). Registers
    /// the subscriber in `Buffering` phase first, so any publish racing the
    /// two store round-trips below is queued rather than delivered ahead of
    /// replay; snapshots `LatestSeq`, streams `ListSince(from_seq)` up to
    /// that snapshot, then drains whatever was buffered in the meantime
    /// (skipping anything already covered by replay) and flips the
    /// subscriber to `Live`, where `broadcast` delivers directly.
    pub async fn subscribe(
        self: &Arc<Self>,
        run_id: RunId,
        from_seq: u64,
    ) -> Result<Subscription, pm_core::KernelError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = {
            let mut runs = self.runs.lock();
            let entry = runs.entry(run_id).or_default();
            let id = entry.next_id;
            entry.next_id += 1;
            entry.subscribers.insert(id, Subscriber { tx: tx.clone(), phase: SubPhase::Buffering(Vec::new()) });
            id
        };

        let snapshot = self
            .store
            .latest_seq(run_id)
            .await
            .map_err(super::event_log::map_storage_err)?;
        let replay = self
            .store
            .list_since(run_id, from_seq)
            .await
            .map_err(super::event_log::map_storage_err)?;
        for event in replay.into_iter().filter(|e| e.seq <= snapshot) {
            // Best-effort: if the subscriber's queue is already gone, later
            // sends will fail too and the caller observes a closed channel.
            let _ = tx.send(HubFrame::Event(Arc::new(event))).await;
        }

        let buffered = {
            let mut runs = self.runs.lock();
            match runs.get_mut(&run_id).and_then(|per_run| per_run.subscribers.get_mut(&id)) {
                Some(sub) => std::mem::replace(&mut sub.phase, SubPhase::Live).into_buffered(),
                None => Vec::new(),
            }
        };
        for frame in buffered {
            // Events already delivered via replay (seq <= snapshot) are
            // skipped so the replay/live boundary has no duplicates.
            if let HubFrame::Event(event) = &frame {
                if event.seq <= snapshot {
                    continue;
                }
            }
            let _ = tx.send(frame).await;
        }

        Ok(Subscription { run_id, id, hub: self.clone(), rx })
    }

    /// `Publish(event)` (spec §4.5), called by the Event Log once the
    /// append is durable. Fans the event out to every live subscriber of
    /// its run; a subscriber whose queue is full is disconnected.
    pub async fn publish(&self, event: Event) {
        let run_id = event.run_id;
        let frame = HubFrame::Event(Arc::new(event));
        self.broadcast(run_id, frame).await;
    }

    /// Sends a `state` frame (spec §4.5), invoked by the Run Manager on
    /// every state transition. Carries no `seq`.
    pub async fn publish_state(&self, run_id: RunId, state: RunState) {
        self.broadcast(run_id, HubFrame::State(state)).await;
    }

    /// Sends a keepalive `ping` frame to every subscriber of `run_id`.
    pub async fn ping(&self, run_id: RunId) {
        self.broadcast(run_id, HubFrame::Ping).await;
    }

    async fn broadcast(&self, run_id: RunId, frame: HubFrame) {
        let mut overflowed = Vec::new();
        let mut to_send: Vec<(u64, mpsc::Sender<HubFrame>)> = Vec::new();
        {
            let mut runs = self.runs.lock();
            let Some(per_run) = runs.get_mut(&run_id) else { return };
            for (id, sub) in per_run.subscribers.iter_mut() {
                match &mut sub.phase {
                    // Still streaming replay: queue behind it instead of
                    // racing ahead on the live channel (spec §4.5 ordering).
                    SubPhase::Buffering(buffered) => {
                        if buffered.len() >= SUBSCRIBER_QUEUE_DEPTH {
                            overflowed.push(*id);
                        } else {
                            buffered.push(frame.clone());
                        }
                    }
                    SubPhase::Live => to_send.push((*id, sub.tx.clone())),
                }
            }
        }
        for (id, tx) in to_send {
            if tx.try_send(frame.clone()).is_err() {
                overflowed.push(id);
            }
        }
        if !overflowed.is_empty() {
            let mut runs = self.runs.lock();
            if let Some(per_run) = runs.get_mut(&run_id) {
                for id in overflowed {
                    per_run.subscribers.remove(&id);
                }
            }
        }
    }

    fn deregister(&self, run_id: RunId, id: u64) {
        let mut runs = self.runs.lock();
        if let Some(per_run) = runs.get_mut(&run_id) {
            per_run.subscribers.remove(&id);
            if per_run.subscribers.is_empty() {
                runs.remove(&run_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::test_support::fixed_time;
    use pm_core::EventKind;
    use pm_storage::MemoryStore;

    fn store() -> Arc<dyn EventStore> {
        Arc::new(MemoryStore::new())
    }

    async fn insert(store: &Arc<dyn EventStore>, run_id: RunId, seq: u64) -> Event {
        store.insert(run_id, seq, EventKind::Stdout, serde_json::json!({"seq": seq}), fixed_time()).await.unwrap()
    }

    #[tokio::test]
    async fn replay_then_live_delivers_strictly_in_order_with_no_gaps() {
        let store = store();
        let run_id = RunId::new();
        insert(&store, run_id, 1).await;
        insert(&store, run_id, 2).await;

        let hub = Arc::new(EventHub::new(store.clone()));
        let mut sub = hub.subscribe(run_id, 0).await.unwrap();

        let live = insert(&store, run_id, 3).await;
        hub.publish(live).await;

        let mut seqs = Vec::new();
        for _ in 0..3 {
            match sub.rx.recv().await.unwrap() {
                HubFrame::Event(e) => seqs.push(e.seq),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn subscribe_from_nonzero_seq_skips_already_seen_events() {
        let store = store();
        let run_id = RunId::new();
        insert(&store, run_id, 1).await;
        insert(&store, run_id, 2).await;
        insert(&store, run_id, 3).await;

        let hub = Arc::new(EventHub::new(store.clone()));
        let mut sub = hub.subscribe(run_id, 2).await.unwrap();

        match sub.rx.recv().await.unwrap() {
            HubFrame::Event(e) => assert_eq!(e.seq, 3),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn state_and_ping_frames_carry_no_seq_and_do_not_block_events() {
        let store = store();
        let run_id = RunId::new();
        let hub = Arc::new(EventHub::new(store.clone()));
        let mut sub = hub.subscribe(run_id, 0).await.unwrap();

        hub.publish_state(run_id, RunState::WaitingApproval).await;
        hub.ping(run_id).await;

        match sub.rx.recv().await.unwrap() {
            HubFrame::State(s) => assert_eq!(s, RunState::WaitingApproval),
            other => panic!("unexpected frame: {other:?}"),
        }
        match sub.rx.recv().await.unwrap() {
            HubFrame::Ping => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closing_a_subscription_is_idempotent_and_stops_delivery() {
        let store = store();
        let run_id = RunId::new();
        let hub = Arc::new(EventHub::new(store.clone()));
        let sub = hub.subscribe(run_id, 0).await.unwrap();
        sub.close();
        // A second logical close (dropping an already-closed handle) must not panic.
        hub.deregister(run_id, 0);

        let event = insert(&store, run_id, 1).await;
        hub.publish(event).await;
        assert!(hub.runs.lock().is_empty());
    }

    #[tokio::test]
    async fn overflowing_a_subscriber_queue_disconnects_it() {
        let store = store();
        let run_id = RunId::new();
        let hub = Arc::new(EventHub::new(store.clone()));
        let sub = hub.subscribe(run_id, 0).await.unwrap();

        for _ in 0..(SUBSCRIBER_QUEUE_DEPTH + 1) {
            hub.ping(run_id).await;
        }

        assert!(hub.runs.lock().get(&run_id).map(|r| r.subscribers.is_empty()).unwrap_or(true));
        drop(sub);
    }

    proptest::proptest! {
        // Spec §4.5: a single subscription must see events strictly in seq
        // order with no gaps and no duplicates across the replay/live
        // boundary, regardless of how many events already exist when it
        // subscribes versus how many arrive afterwards.
        #[test]
        fn replay_then_live_is_gap_free_and_duplicate_free(
            already_stored in 0u64..20,
            from_seq in 0u64..25,
            published_live in 0u64..10,
        ) {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let store = store();
                let run_id = RunId::new();
                for seq in 1..=already_stored {
                    insert(&store, run_id, seq).await;
                }

                let hub = Arc::new(EventHub::new(store.clone()));
                let mut sub = hub.subscribe(run_id, from_seq).await.unwrap();

                for seq in (already_stored + 1)..=(already_stored + published_live) {
                    let event = insert(&store, run_id, seq).await;
                    hub.publish(event).await;
                }

                let expected: Vec<u64> = (1..=(already_stored + published_live))
                    .filter(|seq| *seq > from_seq)
                    .collect();

                let mut seqs = Vec::new();
                while seqs.len() < expected.len() {
                    match tokio::time::timeout(std::time::Duration::from_secs(1), sub.rx.recv()).await {
                        Ok(Some(HubFrame::Event(e))) => seqs.push(e.seq),
                        Ok(Some(_)) => {}
                        Ok(None) | Err(_) => break,
                    }
                }

                prop_assert_eq!(seqs, expected);
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn distinct_runs_do_not_see_each_others_events() {
        let store = store();
        let run_a = RunId::new();
        let run_b = RunId::new();
        let hub = Arc::new(EventHub::new(store.clone()));
        let mut sub_a = hub.subscribe(run_a, 0).await.unwrap();
        let _sub_b = hub.subscribe(run_b, 0).await.unwrap();

        let event = insert(&store, run_b, 1).await;
        hub.publish(event).await;

        hub.ping(run_a).await;
        match sub_a.rx.recv().await.unwrap() {
            HubFrame::Ping => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
