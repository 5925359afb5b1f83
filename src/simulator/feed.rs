use tokio::sync::RwLock;

use crate::model::Instrument;
use crate::registry::InstrumentRegistry;
use crate::tick::StreamEvent;

use super::broadcast::{BroadcastHub, PublishReport, SubscriberId, Subscription};
use super::metrics::{MetricsEvent, MetricsTx};
use super::scheduler::TickScheduler;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub updated: usize,
    pub skipped: Vec<String>,
    pub fanout: PublishReport,
}

/// The live engine's shared state: the registry the timer mutates and the hub it feeds.
///
/// Joining holds the registry read lock while registering, and a tick pass
/// publishes while holding the write lock, so a joiner's baseline is never
/// older than the first update it receives.
pub struct LiveFeed {
    registry: RwLock<InstrumentRegistry>,
    hub: BroadcastHub,
    metrics: MetricsTx,
}

impl LiveFeed {
    pub fn new(registry: InstrumentRegistry, queue_capacity: usize, metrics: MetricsTx) -> Self {
        Self {
            registry: RwLock::new(registry),
            hub: BroadcastHub::new(queue_capacity, metrics.clone()),
            metrics,
        }
    }

    pub async fn join(&self) -> Subscription {
        let registry = self.registry.read().await;
        self.hub.join(registry.snapshot())
    }

    pub fn leave(&self, id: SubscriberId) -> bool {
        self.hub.leave(id)
    }

    pub async fn tick(&self, scheduler: &mut TickScheduler, timestamp_ms: u64) -> TickReport {
        let mut registry = self.registry.write().await;
        let pass = scheduler.run_pass(&mut registry, timestamp_ms);

        let mut fanout = PublishReport::default();
        let updated = pass.events.len();
        for event in pass.events {
            fanout.absorb(self.hub.publish(&StreamEvent::PriceUpdate(event)));
        }
        drop(registry);

        self.metrics.report(MetricsEvent::TickPass {
            updated,
            skipped: pass.skipped.len(),
        });
        self.metrics.report(MetricsEvent::Fanout {
            delivered: fanout.delivered,
            dropped: fanout.dropped,
            evicted: fanout.evicted,
        });

        TickReport {
            updated,
            skipped: pass.skipped,
            fanout,
        }
    }

    pub async fn snapshot(&self) -> Vec<Instrument> {
        self.registry.read().await.snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn disconnect_all(&self) -> usize {
        self.hub.close_all()
    }
}
