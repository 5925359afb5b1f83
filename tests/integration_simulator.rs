use std::collections::HashSet;
use std::time::Duration;

use pse_realtime::constants::{VOLUME_MAX, VOLUME_MIN};
use pse_realtime::model::CATALOG;
use pse_realtime::simulator::{self, SimulatorConfig};
use pse_realtime::tick::StreamEvent;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulator_generates_updates_without_sockets() {
    let config = SimulatorConfig {
        tick_interval: Duration::from_millis(5),
        enable_gateway: false,
        enable_snapshot: false,
        enable_metrics: false,
        ..SimulatorConfig::default()
    };

    let events = simulator::testkit::collect_events(config, 1 + CATALOG.len() * 3)
        .await
        .expect("collect events");

    let mut events = events.into_iter();
    match events.next() {
        Some(StreamEvent::InitialData(instruments)) => {
            assert_eq!(instruments.len(), CATALOG.len());
        }
        other => panic!("expected initial data first, got {other:?}"),
    }

    let updates: Vec<_> = events
        .map(|event| match event {
            StreamEvent::PriceUpdate(tick) => tick,
            other => panic!("initial data must only be sent once, got {other:?}"),
        })
        .collect();

    for tick in &updates {
        assert!(
            tick.price.is_finite() && tick.price > 0.0,
            "price should be positive"
        );
        assert!(
            (VOLUME_MIN..VOLUME_MAX).contains(&tick.volume),
            "volume {} out of range",
            tick.volume
        );
    }

    for pass in updates.chunks(CATALOG.len()) {
        let symbols: Vec<&str> = pass.iter().map(|tick| tick.symbol.as_str()).collect();
        let catalog: Vec<&str> = CATALOG.iter().map(|entry| entry.symbol).collect();
        assert_eq!(symbols, catalog, "each pass visits every symbol in order");
    }

    let distinct: HashSet<&str> = updates.iter().map(|tick| tick.symbol.as_str()).collect();
    assert_eq!(distinct.len(), CATALOG.len());
}
