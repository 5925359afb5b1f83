mod broadcast;
mod feed;
mod gateway;
pub mod metrics;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::clock::current_timestamp_ms;
use crate::constants::{
    GATEWAY_BIND_ADDR, METRICS_INTERVAL_SECS, PROVIDER_REQUEST_TIMEOUT_MS, SNAPSHOT_BIND_ADDR,
    SNAPSHOT_FETCH_TIMEOUT_MS, SUBSCRIBER_QUEUE_CAPACITY, SUBSCRIBER_SEND_TIMEOUT_MS,
    TICK_INTERVAL_SECS,
};
use crate::logging;
use crate::mutator::{MutatorConfig, RandomWalkMutator};
use crate::registry::InstrumentRegistry;
use crate::snapshot::{self, SnapshotService, YahooProvider};

pub use broadcast::{BroadcastHub, PublishReport, SubscriberId, Subscription};
pub use feed::{LiveFeed, TickReport};
pub use scheduler::{TickPass, TickScheduler};

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub gateway_addr: SocketAddr,
    pub snapshot_addr: SocketAddr,
    pub tick_interval: Duration,
    /// Stop gracefully after this many tick passes.
    pub max_ticks: Option<usize>,
    pub enable_gateway: bool,
    pub enable_snapshot: bool,
    pub enable_metrics: bool,
    pub external_quotes: bool,
    pub live_mutator: MutatorConfig,
    pub snapshot_mutator: MutatorConfig,
    pub subscriber_queue: usize,
    pub subscriber_send_timeout: Duration,
    pub snapshot_fetch_timeout: Duration,
    /// Per-symbol budget of the external provider, capped below `snapshot_fetch_timeout`.
    pub provider_request_timeout: Duration,
    pub metrics_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            gateway_addr: GATEWAY_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 4000))),
            snapshot_addr: SNAPSHOT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000))),
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            max_ticks: None,
            enable_gateway: true,
            enable_snapshot: true,
            enable_metrics: true,
            external_quotes: false,
            live_mutator: MutatorConfig::live(),
            snapshot_mutator: MutatorConfig::snapshot(),
            subscriber_queue: SUBSCRIBER_QUEUE_CAPACITY,
            subscriber_send_timeout: Duration::from_millis(SUBSCRIBER_SEND_TIMEOUT_MS),
            snapshot_fetch_timeout: Duration::from_millis(SNAPSHOT_FETCH_TIMEOUT_MS),
            provider_request_timeout: Duration::from_millis(PROVIDER_REQUEST_TIMEOUT_MS),
            metrics_interval: Duration::from_secs(METRICS_INTERVAL_SECS),
        }
    }
}

impl SimulatorConfig {
    /// Provider budget that always expires before the overall fetch deadline.
    pub fn provider_request_budget(&self) -> Duration {
        self.provider_request_timeout
            .min(self.snapshot_fetch_timeout * 4 / 5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    None,
    Graceful,
    Immediate,
}

pub async fn run_with_config(config: SimulatorConfig) -> Result<()> {
    let config = Arc::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let (metrics_tx, metrics_future) =
        metrics::reporter(config.metrics_interval, shutdown_rx.clone());
    let metrics = if config.enable_metrics {
        metrics_tx
    } else {
        drop(metrics_tx);
        metrics::MetricsTx::noop()
    };

    let feed = Arc::new(LiveFeed::new(
        InstrumentRegistry::seed(),
        config.subscriber_queue,
        metrics.clone(),
    ));
    let scheduler = TickScheduler::new(Box::new(RandomWalkMutator::from_entropy(
        config.live_mutator,
    )));

    let signals_task = tokio::spawn(handle_signals(shutdown_tx.clone()));

    let gateway_future = {
        let feed = Arc::clone(&feed);
        let shutdown = shutdown_rx.clone();
        let config = Arc::clone(&config);
        async move {
            if config.enable_gateway {
                gateway::run_gateway(
                    config.gateway_addr,
                    feed,
                    config.subscriber_send_timeout,
                    shutdown,
                )
                .await
            } else {
                Ok(())
            }
        }
    };

    let snapshot_future = {
        let shutdown = shutdown_rx.clone();
        let config = Arc::clone(&config);
        let metrics = metrics.clone();
        async move {
            if !config.enable_snapshot {
                return Ok(());
            }
            let mut service = SnapshotService::new(
                InstrumentRegistry::seed(),
                Box::new(RandomWalkMutator::from_entropy(config.snapshot_mutator)),
                config.snapshot_fetch_timeout,
            )
            .with_metrics(metrics);
            if config.external_quotes {
                match YahooProvider::new(config.provider_request_budget()) {
                    Ok(provider) => service = service.with_provider(Arc::new(provider)),
                    Err(err) => logging::warn(
                        "snapshot.provider_disabled",
                        "External quote provider unavailable; serving simulated snapshots",
                        json!({ "error": format!("{err:?}") }),
                    ),
                }
            }
            if let Err(err) =
                snapshot::serve(config.snapshot_addr, Arc::new(service), shutdown).await
            {
                logging::error(
                    "snapshot.server_error",
                    "Snapshot endpoint unavailable; live feed keeps running",
                    json!({ "error": format!("{err:?}") }),
                );
            }
            Ok::<(), anyhow::Error>(())
        }
    };

    let run_result = tokio::try_join!(
        gateway_future,
        snapshot_future,
        run_tick_generator(
            Arc::clone(&config),
            Arc::clone(&feed),
            scheduler,
            shutdown_tx.clone(),
            shutdown_rx.clone(),
        ),
        metrics_future,
    );

    if run_result.is_err() {
        let _ = shutdown_tx.send(ShutdownSignal::Immediate);
    }
    signals_task.abort();
    let _ = signals_task.await;

    run_result?;
    Ok(())
}

async fn handle_signals(shutdown_tx: watch::Sender<ShutdownSignal>) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            logging::info(
                "signal.received",
                "SIGTERM received, initiating graceful shutdown",
                json!({ "signal": "SIGTERM" })
            );
            let _ = shutdown_tx.send(ShutdownSignal::Graceful);
        }
        _ = sigint.recv() => {
            logging::warn(
                "signal.received",
                "SIGINT received, forcing immediate shutdown",
                json!({ "signal": "SIGINT" })
            );
            let _ = shutdown_tx.send(ShutdownSignal::Immediate);
        }
    }

    Ok(())
}

async fn run_tick_generator(
    config: Arc<SimulatorConfig>,
    feed: Arc<LiveFeed>,
    mut scheduler: TickScheduler,
    shutdown_tx: watch::Sender<ShutdownSignal>,
    mut shutdown_rx: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let mut ticker = time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first pass fires one interval after start, like a wall-clock timer.
    ticker.reset();

    logging::info(
        "tick_generator.start",
        "Tick generator running",
        json!({
            "interval_ms": config.tick_interval.as_millis() as u64,
            "swing_percent": config.live_mutator.swing_percent,
        }),
    );

    let mut passes: usize = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                match *shutdown_rx.borrow() {
                    ShutdownSignal::None => continue,
                    _ => break,
                }
            }
        }

        let report = feed.tick(&mut scheduler, current_timestamp_ms()).await;
        passes = passes.saturating_add(1);
        if !report.skipped.is_empty() {
            logging::warn(
                "tick_generator.partial_pass",
                "Some instruments were skipped this pass",
                json!({ "skipped": report.skipped, "updated": report.updated }),
            );
        }

        if let Some(max) = config.max_ticks {
            if passes >= max {
                logging::info(
                    "tick_generator.limit",
                    "Tick generator reached max tick budget",
                    json!({ "max_ticks": max }),
                );
                let _ = shutdown_tx.send(ShutdownSignal::Graceful);
                break;
            }
        }
    }

    logging::info(
        "tick_generator.stop",
        "Tick generator stopped",
        json!({ "passes": passes }),
    );
    Ok(())
}

pub mod testkit {
    use super::*;
    use crate::tick::StreamEvent;

    /// Run the live engine in-process, with no sockets, and collect the first
    /// `count` messages seen by one subscriber joined before the first pass.
    pub async fn collect_events(config: SimulatorConfig, count: usize) -> Result<Vec<StreamEvent>> {
        let config = Arc::new(SimulatorConfig {
            max_ticks: None,
            ..config
        });
        let feed = Arc::new(LiveFeed::new(
            InstrumentRegistry::seed(),
            config.subscriber_queue,
            metrics::MetricsTx::noop(),
        ));
        let scheduler = TickScheduler::new(Box::new(RandomWalkMutator::seeded(
            config.live_mutator,
            0xBADF00D,
        )));

        let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let mut subscription = feed.join().await;

        let generator_handle = tokio::spawn(run_tick_generator(
            Arc::clone(&config),
            Arc::clone(&feed),
            scheduler,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        let mut collected = Vec::with_capacity(count);
        while collected.len() < count {
            match subscription.recv().await {
                Some(event) => collected.push(event),
                None => break,
            }
        }

        let _ = shutdown_tx.send(ShutdownSignal::Graceful);
        generator_handle.await??;
        feed.leave(subscription.id());

        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_budget_expires_before_fetch_deadline() {
        let config = SimulatorConfig::default();
        assert_eq!(config.provider_request_budget(), Duration::from_secs(3));
        assert!(config.provider_request_budget() < config.snapshot_fetch_timeout);

        let tight = SimulatorConfig {
            snapshot_fetch_timeout: Duration::from_millis(1_000),
            provider_request_timeout: Duration::from_millis(1_000),
            ..SimulatorConfig::default()
        };
        assert_eq!(tight.provider_request_budget(), Duration::from_millis(800));
    }
}
