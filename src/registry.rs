use crate::clock::current_timestamp_ms;
use crate::model::{Instrument, CATALOG};

/// Owned table of instruments, one record per symbol, ordered by symbol.
///
/// The live feed and the snapshot endpoint each hold their own instance.
#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    /// Build a registry from the static catalog.
    pub fn seed() -> Self {
        let now = current_timestamp_ms();
        Self::from_instruments(
            CATALOG
                .iter()
                .map(|entry| Instrument::from_catalog(entry, now))
                .collect(),
        )
    }

    /// Build a registry from arbitrary instruments. Later duplicates of a symbol are dropped.
    pub fn from_instruments(mut instruments: Vec<Instrument>) -> Self {
        instruments.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        instruments.dedup_by(|later, earlier| later.symbol == earlier.symbol);
        Self { instruments }
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub(crate) fn instruments_mut(&mut self) -> &mut [Instrument] {
        &mut self.instruments
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.position(symbol).map(|idx| &self.instruments[idx])
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut Instrument> {
        self.position(symbol).map(|idx| &mut self.instruments[idx])
    }

    /// Display name for `symbol`, or the symbol itself when it is not tracked.
    pub fn lookup_name<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.get(symbol)
            .map(|instrument| instrument.name.as_str())
            .unwrap_or(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.instruments
            .iter()
            .map(|instrument| instrument.symbol.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Instrument> {
        self.instruments.clone()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    fn position(&self, symbol: &str) -> Option<usize> {
        self.instruments
            .binary_search_by(|instrument| instrument.symbol.as_str().cmp(symbol))
            .ok()
    }
}
