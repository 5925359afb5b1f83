//! Request/response snapshot of the whole catalog.
//!
//! Each call builds a complete, symbol-sorted snapshot. Quotes come from the
//! optional external provider first; every symbol it misses is filled by this
//! endpoint's own simulated book, which never shares state with the live feed.

mod provider;
mod server;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time;

use crate::clock::current_timestamp_ms;
use crate::error::SnapshotError;
use crate::logging;
use crate::model::Instrument;
use crate::mutator::PriceMutator;
use crate::registry::InstrumentRegistry;
use crate::simulator::metrics::{MetricsEvent, MetricsTx};

pub use provider::{ProviderQuote, QuoteProvider, YahooProvider};
pub use server::{router, serve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotSource {
    Simulated,
    YahooFinance,
    Mixed,
}

impl SnapshotSource {
    fn from_counts(external: usize, simulated: usize) -> Self {
        match (external, simulated) {
            (0, _) => SnapshotSource::Simulated,
            (_, 0) => SnapshotSource::YahooFinance,
            _ => SnapshotSource::Mixed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub stocks: Vec<Instrument>,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    pub source: SnapshotSource,
    #[serde(skip)]
    pub external_count: usize,
    #[serde(skip)]
    pub simulated_count: usize,
}

/// Simulation private to the snapshot endpoint.
struct SimulatedBook {
    registry: InstrumentRegistry,
    mutator: Box<dyn PriceMutator>,
}

impl SimulatedBook {
    /// Advance every listed symbol, or none of them: all quotes are drawn and
    /// checked before the book is touched.
    fn advance_all(
        &mut self,
        symbols: &[&String],
        timestamp_ms: u64,
    ) -> Result<Vec<Instrument>, SnapshotError> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let instrument = self
                .registry
                .get(symbol)
                .ok_or_else(|| SnapshotError::MissingInstrument(symbol.to_string()))?;
            let quote = self.mutator.mutate(instrument.price);
            if !quote.is_valid() {
                return Err(SnapshotError::RejectedQuote {
                    symbol: symbol.to_string(),
                });
            }
            quotes.push(quote);
        }

        let mut advanced = Vec::with_capacity(symbols.len());
        for (symbol, quote) in symbols.iter().zip(quotes) {
            if let Some(instrument) = self.registry.get_mut(symbol) {
                quote.apply_to(instrument, timestamp_ms);
                advanced.push(instrument.clone());
            }
        }
        Ok(advanced)
    }
}

pub struct SnapshotService {
    book: Mutex<SimulatedBook>,
    symbols: Vec<String>,
    provider: Option<Arc<dyn QuoteProvider>>,
    fetch_timeout: Duration,
    metrics: MetricsTx,
}

impl SnapshotService {
    pub fn new(
        registry: InstrumentRegistry,
        mutator: Box<dyn PriceMutator>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            symbols: registry.symbols(),
            book: Mutex::new(SimulatedBook { registry, mutator }),
            provider: None,
            fetch_timeout,
            metrics: MetricsTx::noop(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsTx) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn get_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let fetched = self.fetch_external().await;
        let timestamp_ms = current_timestamp_ms();

        let mut book = self.book.lock().await;
        let missing: Vec<&String> = self
            .symbols
            .iter()
            .filter(|symbol| !fetched.contains_key(*symbol))
            .collect();
        let mut stocks = book.advance_all(&missing, timestamp_ms)?;
        let external_count = self.symbols.len() - missing.len();
        for (symbol, quote) in &fetched {
            stocks.push(Instrument {
                symbol: symbol.clone(),
                name: book.registry.lookup_name(symbol).to_string(),
                price: quote.price,
                change: quote.change,
                percent_change: quote.percent_change,
                volume: quote.volume,
                last_updated_ms: timestamp_ms,
            });
        }
        drop(book);

        stocks.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let simulated_count = stocks.len() - external_count;
        self.metrics.report(MetricsEvent::SnapshotServed {
            external: external_count,
            simulated: simulated_count,
        });

        Ok(Snapshot {
            stocks,
            timestamp_ms,
            source: SnapshotSource::from_counts(external_count, simulated_count),
            external_count,
            simulated_count,
        })
    }

    async fn fetch_external(&self) -> HashMap<String, ProviderQuote> {
        let Some(provider) = &self.provider else {
            return HashMap::new();
        };

        match time::timeout(self.fetch_timeout, provider.fetch(&self.symbols)).await {
            Ok(Ok(mut quotes)) => {
                quotes.retain(|symbol, quote| {
                    self.symbols.contains(symbol) && quote.price.is_finite() && quote.price > 0.0
                });
                if quotes.len() < self.symbols.len() {
                    logging::info(
                        "snapshot.partial",
                        "Filling symbols missing from quote source with simulated values",
                        json!({
                            "provider": provider.name(),
                            "resolved": quotes.len(),
                            "missing": self.symbols.len() - quotes.len(),
                        }),
                    );
                }
                quotes
            }
            Ok(Err(err)) => {
                logging::warn(
                    "snapshot.fallback",
                    "Quote source failed; serving fully simulated snapshot",
                    json!({ "provider": provider.name(), "error": err.to_string() }),
                );
                HashMap::new()
            }
            Err(_) => {
                logging::warn(
                    "snapshot.fallback",
                    "Quote source timed out; serving fully simulated snapshot",
                    json!({
                        "provider": provider.name(),
                        "timeout_ms": self.fetch_timeout.as_millis() as u64,
                    }),
                );
                HashMap::new()
            }
        }
    }
}
