use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::logging;
use crate::tick::StreamEvent;

/// Subscriber side of the live feed websocket.
pub struct EventStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStream {
    pub async fn connect(url: &str) -> Result<Self> {
        let (inner, _) = connect_async(url).await.with_context(|| {
            format!("failed to connect to {url}; run `pse-realtime run` first")
        })?;
        Ok(Self { inner })
    }

    /// Next decoded event, or `None` once the server closes the stream.
    /// Malformed frames are logged and skipped.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        while let Some(message) = self.inner.next().await {
            let decoded = match message.context("websocket read failed")? {
                Message::Text(text) => serde_json::from_str::<StreamEvent>(&text),
                Message::Binary(bytes) => serde_json::from_slice::<StreamEvent>(&bytes),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };
            match decoded {
                Ok(event) => return Ok(Some(event)),
                Err(err) => logging::warn(
                    "client.malformed_event",
                    "Dropping malformed stream event",
                    json!({ "error": err.to_string() }),
                ),
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<()> {
        self.inner
            .close(None)
            .await
            .context("failed to close websocket")
    }
}
