use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time;

use crate::constants::GATEWAY_WS_PATH;
use crate::logging;

use super::broadcast::Subscription;
use super::feed::LiveFeed;
use super::ShutdownSignal;

/// Why a client's forwarding loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    ClientClosed,
    FeedClosed,
    SendFailed,
    SendTimedOut,
}

impl Disconnect {
    fn as_str(self) -> &'static str {
        match self {
            Disconnect::ClientClosed => "client_closed",
            Disconnect::FeedClosed => "feed_closed",
            Disconnect::SendFailed => "send_failed",
            Disconnect::SendTimedOut => "send_timed_out",
        }
    }
}

/// Binds the websocket listener. A bind failure is returned to the caller and is fatal.
pub(super) async fn run_gateway(
    addr: SocketAddr,
    feed: Arc<LiveFeed>,
    send_timeout: Duration,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind gateway websocket at {addr}"))?;

    logging::info(
        "gateway.bind",
        "Gateway websocket listening for subscribers",
        json!({ "addr": addr.to_string(), "path": GATEWAY_WS_PATH }),
    );

    let app = Router::new().route(
        GATEWAY_WS_PATH,
        get({
            let feed = Arc::clone(&feed);
            move |ws: WebSocketUpgrade| websocket_upgrade(ws, Arc::clone(&feed), send_timeout)
        }),
    );

    let shutdown_signal = {
        let feed = Arc::clone(&feed);
        async move {
            while shutdown.changed().await.is_ok() {
                if !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                    break;
                }
            }
            let closed = feed.disconnect_all();
            logging::info(
                "gateway.shutdown",
                "Closing subscriber connections",
                json!({ "subscribers": closed }),
            );
        }
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("gateway server terminated with error")?;

    logging::info_simple("gateway.server.stop", "Gateway websocket server stopped");
    Ok(())
}

async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    feed: Arc<LiveFeed>,
    send_timeout: Duration,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(err) = serve_subscriber(socket, feed, send_timeout).await {
            logging::warn(
                "gateway.client_error",
                "Gateway websocket client ended with error",
                json!({ "error": format!("{err:?}") }),
            );
        }
    })
}

async fn serve_subscriber(
    socket: WebSocket,
    feed: Arc<LiveFeed>,
    send_timeout: Duration,
) -> Result<()> {
    let mut subscription = feed.join().await;
    let id = subscription.id();
    logging::info(
        "gateway.client.connected",
        "Gateway websocket client connected",
        json!({ "subscriber": id.to_string(), "subscribers": feed.subscriber_count() }),
    );

    let outcome = forward_events(socket, &mut subscription, send_timeout).await;
    feed.leave(id);

    let reason = outcome.as_ref().map(|reason| reason.as_str()).unwrap_or("error");
    logging::info(
        "gateway.client.disconnected",
        "Gateway websocket client disconnected",
        json!({ "subscriber": id.to_string(), "reason": reason }),
    );
    outcome.map(|_| ())
}

async fn forward_events(
    socket: WebSocket,
    subscription: &mut Subscription,
    send_timeout: Duration,
) -> Result<Disconnect> {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });
    let mut reader_done = false;

    let outcome = loop {
        tokio::select! {
            _ = &mut reader => {
                reader_done = true;
                break Ok(Disconnect::ClientClosed);
            }
            maybe_event = subscription.recv() => {
                let Some(event) = maybe_event else {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break Ok(Disconnect::FeedClosed);
                };
                let payload = match serde_json::to_string(&event).context("serialize stream event") {
                    Ok(payload) => payload,
                    Err(err) => break Err(err),
                };
                match time::timeout(send_timeout, ws_sender.send(Message::Text(payload))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => break Ok(Disconnect::SendFailed),
                    Err(_) => {
                        logging::warn(
                            "gateway.client.stalled",
                            "Websocket client stalled past send timeout",
                            json!({
                                "subscriber": subscription.id().to_string(),
                                "timeout_ms": send_timeout.as_millis() as u64,
                            }),
                        );
                        break Ok(Disconnect::SendTimedOut);
                    }
                }
            }
        }
    };

    if !reader_done {
        reader.abort();
        let _ = reader.await;
    }
    outcome
}
