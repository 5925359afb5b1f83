use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::constants::SNAPSHOT_PATH;
use crate::error::SnapshotError;
use crate::logging;
use crate::simulator::ShutdownSignal;

use super::{Snapshot, SnapshotService};

pub fn router(service: Arc<SnapshotService>) -> Router {
    Router::new()
        .route(SNAPSHOT_PATH, get(get_stocks))
        .with_state(service)
}

pub async fn serve(
    addr: SocketAddr,
    service: Arc<SnapshotService>,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind snapshot endpoint at {addr}"))?;

    logging::info(
        "snapshot.bind",
        "Snapshot endpoint listening",
        json!({ "addr": addr.to_string(), "path": SNAPSHOT_PATH }),
    );

    let shutdown_signal = async move {
        while shutdown.changed().await.is_ok() {
            if !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                break;
            }
        }
    };

    axum::serve(listener, router(service).into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("snapshot server terminated with error")?;

    logging::info_simple("snapshot.server.stop", "Snapshot endpoint stopped");
    Ok(())
}

async fn get_stocks(
    State(service): State<Arc<SnapshotService>>,
) -> Result<Json<Snapshot>, SnapshotError> {
    match service.get_snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(err) => {
            logging::error(
                "snapshot.request_failed",
                "Snapshot request failed",
                json!({ "error": err.to_string() }),
            );
            Err(err)
        }
    }
}
