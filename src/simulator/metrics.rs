use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};

use crate::logging;

use super::ShutdownSignal;

#[derive(Debug)]
pub enum MetricsEvent {
    TickPass {
        updated: usize,
        skipped: usize,
    },
    Fanout {
        delivered: usize,
        dropped: usize,
        evicted: usize,
    },
    SubscriberJoined,
    SubscriberLeft,
    SnapshotServed {
        external: usize,
        simulated: usize,
    },
}

#[derive(Clone, Default)]
pub struct MetricsTx(Option<mpsc::UnboundedSender<MetricsEvent>>);

impl MetricsTx {
    pub fn report(&self, event: MetricsEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }

    pub fn noop() -> Self {
        Self(None)
    }
}

#[derive(Default)]
struct Window {
    passes: usize,
    updated: usize,
    skipped: usize,
    delivered: usize,
    dropped: usize,
    evicted: usize,
    joined: usize,
    left: usize,
    snapshots: usize,
    snapshot_external: usize,
    snapshot_simulated: usize,
}

impl Window {
    fn record(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::TickPass { updated, skipped } => {
                self.passes = self.passes.saturating_add(1);
                self.updated = self.updated.saturating_add(updated);
                self.skipped = self.skipped.saturating_add(skipped);
            }
            MetricsEvent::Fanout {
                delivered,
                dropped,
                evicted,
            } => {
                self.delivered = self.delivered.saturating_add(delivered);
                self.dropped = self.dropped.saturating_add(dropped);
                self.evicted = self.evicted.saturating_add(evicted);
            }
            MetricsEvent::SubscriberJoined => self.joined = self.joined.saturating_add(1),
            MetricsEvent::SubscriberLeft => self.left = self.left.saturating_add(1),
            MetricsEvent::SnapshotServed {
                external,
                simulated,
            } => {
                self.snapshots = self.snapshots.saturating_add(1);
                self.snapshot_external = self.snapshot_external.saturating_add(external);
                self.snapshot_simulated = self.snapshot_simulated.saturating_add(simulated);
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.passes == 0 && self.joined == 0 && self.left == 0 && self.snapshots == 0
    }
}

/// Returns the reporting handle and the aggregation task; dropping every handle stops the task.
pub fn reporter(
    period: Duration,
    shutdown: watch::Receiver<ShutdownSignal>,
) -> (MetricsTx, impl std::future::Future<Output = Result<()>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricsTx(Some(tx)), process_events(rx, period, shutdown))
}

async fn process_events(
    mut rx: mpsc::UnboundedReceiver<MetricsEvent>,
    period: Duration,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let mut window = Window::default();
    let mut reporter = interval(period);
    reporter.set_missed_tick_behavior(MissedTickBehavior::Skip);
    reporter.reset();

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => window.record(event),
                    None => break,
                }
            }
            _ = reporter.tick() => {
                if !window.is_idle() {
                    logging::info(
                        "metrics.throughput",
                        "live feed throughput summary",
                        json!({
                            "tick_passes": window.passes,
                            "instruments_updated": window.updated,
                            "instruments_skipped": window.skipped,
                            "events_delivered": window.delivered,
                            "events_dropped": window.dropped,
                            "subscribers_evicted": window.evicted,
                            "subscribers_joined": window.joined,
                            "subscribers_left": window.left,
                            "snapshots_served": window.snapshots,
                            "snapshot_external_quotes": window.snapshot_external,
                            "snapshot_simulated_quotes": window.snapshot_simulated,
                        })
                    );
                }
                window = Window::default();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                    break;
                }
            }
        }
    }

    logging::info_simple("metrics.stop", "Metrics reporter stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_accumulates_events() {
        let mut window = Window::default();
        assert!(window.is_idle());

        window.record(MetricsEvent::TickPass {
            updated: 30,
            skipped: 0,
        });
        window.record(MetricsEvent::Fanout {
            delivered: 58,
            dropped: 1,
            evicted: 1,
        });
        window.record(MetricsEvent::SnapshotServed {
            external: 18,
            simulated: 12,
        });

        assert!(!window.is_idle());
        assert_eq!(window.passes, 1);
        assert_eq!(window.delivered, 58);
        assert_eq!(window.snapshot_simulated, 12);
    }

    #[tokio::test]
    async fn reporter_stops_when_handles_drop() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let (tx, task) = reporter(Duration::from_secs(3600), shutdown_rx);
        tx.report(MetricsEvent::SubscriberJoined);
        drop(tx);
        task.await.expect("reporter exits cleanly");
    }
}
