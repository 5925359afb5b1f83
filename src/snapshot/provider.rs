use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time;

use crate::constants::{YAHOO_BASE_URL, YAHOO_SYMBOL_SUFFIX};
use crate::error::ProviderError;
use crate::logging;
use crate::mutator::round2;

/// Price data for one symbol as reported by an external source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderQuote {
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: u64,
}

/// Source of real-world quotes for the snapshot endpoint.
///
/// `fetch` returns whatever subset of `symbols` it could resolve; an `Err`
/// means the whole source was unusable.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, ProviderQuote>, ProviderError>;
}

/// Yahoo Finance chart API, PSE listings.
///
/// Each symbol gets its own `request_timeout`; a slow symbol is reported as
/// missing without holding back the ones that already resolved.
pub struct YahooProvider {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl YahooProvider {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Self::with_base_url(YAHOO_BASE_URL, request_timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pse-realtime/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("failed to build quote provider HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    async fn fetch_symbol_bounded(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
        time::timeout(self.request_timeout, self.fetch_symbol(symbol))
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::TimedOut {
                    symbol: symbol.to_string(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            })
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{symbol}{YAHOO_SYMBOL_SUFFIX}",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let payload: ChartResponse = response.json().await?;
        quote_from_chart(payload).ok_or_else(|| ProviderError::EmptyChart(symbol.to_string()))
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo-finance"
    }

    async fn fetch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, ProviderQuote>, ProviderError> {
        let results = join_all(
            symbols
                .iter()
                .map(|symbol| self.fetch_symbol_bounded(symbol)),
        )
        .await;

        let mut quotes = HashMap::with_capacity(symbols.len());
        let mut transport_failures = 0usize;
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(quote) => {
                    quotes.insert(symbol.clone(), quote);
                }
                Err(err) => {
                    if matches!(
                        err,
                        ProviderError::Request(_) | ProviderError::TimedOut { .. }
                    ) {
                        transport_failures += 1;
                    }
                    logging::warn(
                        "snapshot.provider.symbol_failed",
                        "Quote source could not resolve symbol",
                        json!({ "symbol": symbol, "error": err.to_string() }),
                    );
                }
            }
        }

        if !symbols.is_empty() && transport_failures == symbols.len() {
            return Err(ProviderError::Unreachable {
                attempted: symbols.len(),
            });
        }
        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    volume: Option<Vec<Option<u64>>>,
}

fn quote_from_chart(payload: ChartResponse) -> Option<ProviderQuote> {
    let result = payload.chart.result?.into_iter().next()?;
    let price = result.meta.regular_market_price?;
    let previous = result
        .meta
        .previous_close
        .or(result.meta.chart_previous_close)?;
    if !(price.is_finite() && price > 0.0 && previous.is_finite() && previous > 0.0) {
        return None;
    }

    let volume = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .and_then(|quote| quote.volume)
        .and_then(|volumes| volumes.into_iter().next().flatten())
        .unwrap_or(0);

    let change = price - previous;
    Some(ProviderQuote {
        price: round2(price),
        change: round2(change),
        percent_change: round2(change / previous * 100.0),
        volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<ProviderQuote> {
        quote_from_chart(serde_json::from_str(json).expect("valid chart payload"))
    }

    #[test]
    fn chart_payload_maps_to_quote() {
        let quote = parse(
            r#"{"chart":{"result":[{
                "meta":{"symbol":"SM.PS","regularMarketPrice":1030.5,"previousClose":1025.0},
                "indicators":{"quote":[{"volume":[123456,null]}]}
            }],"error":null}}"#,
        )
        .expect("quote");

        assert_eq!(quote.price, 1030.5);
        assert_eq!(quote.change, 5.5);
        assert_eq!(quote.percent_change, 0.54);
        assert_eq!(quote.volume, 123_456);
    }

    #[test]
    fn missing_volume_defaults_to_zero() {
        let quote = parse(
            r#"{"chart":{"result":[{"meta":{"regularMarketPrice":10.0,"chartPreviousClose":10.0},"indicators":{"quote":[{}]}}]}}"#,
        )
        .expect("quote");
        assert_eq!(quote.volume, 0);
        assert_eq!(quote.change, 0.0);
    }

    #[test]
    fn empty_or_invalid_charts_are_rejected() {
        assert!(parse(r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#).is_none());
        assert!(parse(r#"{"chart":{"result":[]}}"#).is_none());
        assert!(parse(
            r#"{"chart":{"result":[{"meta":{"regularMarketPrice":10.0,"previousClose":0.0}}]}}"#
        )
        .is_none());
    }
}
