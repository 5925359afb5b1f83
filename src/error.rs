use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clock::current_timestamp_ms;

/// Internal faults of the snapshot endpoint; the only cases that answer 500.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot book is missing catalog symbol {0}")]
    MissingInstrument(String),

    #[error("simulated quote for {symbol} was rejected")]
    RejectedQuote { symbol: String },
}

impl IntoResponse for SnapshotError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "Failed to fetch stock data",
            "timestamp": current_timestamp_ms(),
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Failures of an external quote source. None of them reach the HTTP caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to quote source failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("quote source answered with status {0}")]
    Status(u16),

    #[error("quote source did not answer for {symbol} within {timeout_ms} ms")]
    TimedOut { symbol: String, timeout_ms: u64 },

    #[error("quote source had no usable chart for {0}")]
    EmptyChart(String),

    #[error("quote source unreachable for all {attempted} symbols")]
    Unreachable { attempted: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_errors_map_to_internal_server_error() {
        let response = SnapshotError::MissingInstrument("SM".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn provider_error_messages_name_the_cause() {
        assert_eq!(
            ProviderError::Unreachable { attempted: 30 }.to_string(),
            "quote source unreachable for all 30 symbols"
        );
        assert_eq!(
            ProviderError::Status(503).to_string(),
            "quote source answered with status 503"
        );
    }
}
