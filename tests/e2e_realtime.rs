use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use futures_util::StreamExt;
use pse_realtime::clock::current_timestamp_ms;
use pse_realtime::constants::HISTORY_CAPACITY;
use pse_realtime::history::HistoryBuffer;
use pse_realtime::simulator::{self, SimulatorConfig};
use pse_realtime::tick::StreamEvent;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

fn free_local_addr() -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

async fn start_simulator() -> (SocketAddr, JoinHandle<()>) {
    let addr = free_local_addr();
    let config = SimulatorConfig {
        gateway_addr: addr,
        tick_interval: Duration::from_millis(20),
        enable_snapshot: false,
        enable_metrics: false,
        max_ticks: None,
        ..SimulatorConfig::default()
    };

    let handle = tokio::spawn(async move {
        let _ = simulator::run_with_config(config).await;
    });
    (addr, handle)
}

async fn connect(
    url: &str,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    loop {
        match tokio_tungstenite::connect_async(url).await {
            Ok((ws, _)) => return ws,
            Err(err) => {
                if let tokio_tungstenite::tungstenite::Error::Io(io) = &err {
                    if matches!(io.kind(), std::io::ErrorKind::ConnectionRefused) {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                }
                panic!("failed to connect to gateway: {err}");
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn websocket_stream_starts_with_snapshot_and_fills_history() {
    let (addr, handle) = start_simulator().await;
    let mut ws = connect(&format!("ws://{addr}/ws")).await;

    let mut history = HistoryBuffer::default();
    let mut first = true;

    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("websocket message timeout");

        let payload = match message {
            Some(Ok(Message::Text(payload))) => payload,
            Some(Ok(_)) => continue,
            Some(Err(err)) => panic!("websocket error: {err}"),
            None => panic!("gateway closed the stream early"),
        };

        let event: StreamEvent = serde_json::from_str(&payload).expect("valid event");
        if first {
            let StreamEvent::InitialData(instruments) = &event else {
                panic!("first message must be initialData, got {payload}");
            };
            assert_eq!(instruments.len(), 30);
            assert!(instruments.windows(2).all(|w| w[0].symbol < w[1].symbol));
            first = false;
        } else {
            assert!(
                matches!(event, StreamEvent::PriceUpdate(_)),
                "only one initialData per connection"
            );
        }
        history.apply(&event, current_timestamp_ms());

        let series = history.series_for("SM").expect("SM window");
        if series.len() == HISTORY_CAPACITY {
            break;
        }
    }

    for _ in 0..60 {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("websocket message timeout");
        if let Some(Ok(Message::Text(payload))) = message {
            let event: StreamEvent = serde_json::from_str(&payload).expect("valid event");
            history.apply(&event, current_timestamp_ms());
        }
    }

    let series = history.series_for("SM").expect("SM window");
    assert_eq!(series.len(), HISTORY_CAPACITY, "window stays capped");
    assert_eq!(series.prices().len(), series.volumes().len());
    assert_eq!(history.display_name("SM"), "SM Investments Corporation");

    let _ = ws.close(None).await;
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn late_joiner_sees_current_prices() {
    let (addr, handle) = start_simulator().await;
    let url = format!("ws://{addr}/ws");

    let mut early = connect(&url).await;
    let mut last_seen = None;
    let mut updates = 0usize;
    while updates < 45 {
        let message = tokio::time::timeout(Duration::from_secs(5), early.next())
            .await
            .expect("websocket message timeout");
        if let Some(Ok(Message::Text(payload))) = message {
            if let StreamEvent::PriceUpdate(tick) =
                serde_json::from_str(&payload).expect("valid event")
            {
                if tick.symbol == "AC" {
                    last_seen = Some(tick.price);
                }
                updates += 1;
            }
        }
    }
    let _ = early.close(None).await;

    let mut late = connect(&url).await;
    let message = tokio::time::timeout(Duration::from_secs(5), late.next())
        .await
        .expect("websocket message timeout");
    let Some(Ok(Message::Text(payload))) = message else {
        panic!("expected text frame");
    };
    let StreamEvent::InitialData(instruments) =
        serde_json::from_str(&payload).expect("valid event")
    else {
        panic!("late joiner must start with initialData");
    };
    assert_eq!(instruments.len(), 30);
    assert!(last_seen.is_some(), "early subscriber saw at least one AC update");
    assert!(instruments.iter().all(|instrument| instrument.price > 0.0));
    assert!(
        instruments.iter().any(|instrument| instrument.change != 0.0),
        "snapshot reflects ticks that already happened"
    );

    let _ = late.close(None).await;
    handle.abort();
}
