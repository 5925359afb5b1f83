use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::json;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::logging;
use crate::model::Instrument;
use crate::tick::StreamEvent;

use super::metrics::{MetricsEvent, MetricsTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end handed to a connection on join.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<StreamEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued event; `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of one `publish` across the member set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub evicted: usize,
}

impl PublishReport {
    pub fn absorb(&mut self, other: PublishReport) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.evicted += other.evicted;
    }
}

/// Fan-out set of subscriber queues.
///
/// Every subscriber owns a bounded queue; publishing never waits on a slow
/// reader. A full queue drops that one event for that one subscriber, a closed
/// queue evicts the subscriber.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<StreamEvent>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    metrics: MetricsTx,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize, metrics: MetricsTx) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
            metrics,
        }
    }

    /// Register a subscriber whose first queued message is `snapshot`.
    pub fn join(&self, snapshot: Vec<Instrument>) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        // Fresh queue with capacity >= 1, so the baseline always fits.
        let _ = sender.try_send(StreamEvent::InitialData(snapshot));

        self.members().insert(id, sender);
        self.metrics.report(MetricsEvent::SubscriberJoined);
        Subscription { id, receiver }
    }

    /// Deregister `id`. Returns whether it was still registered.
    pub fn leave(&self, id: SubscriberId) -> bool {
        let removed = self.members().remove(&id).is_some();
        if removed {
            self.metrics.report(MetricsEvent::SubscriberLeft);
        }
        removed
    }

    pub fn publish(&self, event: &StreamEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut members = self.members();
        let mut closed = Vec::new();

        for (id, sender) in members.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.dropped += 1,
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            members.remove(&id);
            report.evicted += 1;
            logging::info(
                "broadcast.evict",
                "Dropped subscriber with closed queue",
                json!({ "subscriber": id.to_string() }),
            );
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.members().len()
    }

    /// Drop every subscriber; their `recv` returns `None` once drained.
    pub fn close_all(&self) -> usize {
        let mut members = self.members();
        let count = members.len();
        members.clear();
        count
    }

    fn members(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<StreamEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
