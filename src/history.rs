use std::{
    cmp::Ordering,
    collections::{HashMap, VecDeque},
    mem,
};

use indexmap::IndexMap;

use crate::constants::HISTORY_CAPACITY;
use crate::model::Instrument;
use crate::tick::{StreamEvent, TickEvent};

pub type Movers = Vec<(String, f64)>;

/// Rolling window for one symbol: three parallel sequences of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySeries {
    timestamps: VecDeque<u64>,
    prices: VecDeque<f64>,
    volumes: VecDeque<u64>,
}

impl HistorySeries {
    /// Append one observation and keep only the newest `capacity` entries.
    pub fn fold(mut self, event: &TickEvent, arrival_ms: u64, capacity: usize) -> Self {
        self.timestamps.push_back(arrival_ms);
        self.prices.push_back(event.price);
        self.volumes.push_back(event.volume);
        while self.timestamps.len() > capacity {
            self.timestamps.pop_front();
            self.prices.pop_front();
            self.volumes.pop_front();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &VecDeque<u64> {
        &self.timestamps
    }

    pub fn prices(&self) -> &VecDeque<f64> {
        &self.prices
    }

    pub fn volumes(&self) -> &VecDeque<u64> {
        &self.volumes
    }

    /// Percent move from the oldest to the newest price in the window.
    pub fn window_change_percent(&self) -> Option<f64> {
        let first = *self.prices.front()?;
        let last = *self.prices.back()?;
        (first > 0.0).then(|| (last - first) / first * 100.0)
    }
}

/// Fold with the default window of 30 entries.
pub fn fold(series: HistorySeries, event: &TickEvent, arrival_ms: u64) -> HistorySeries {
    series.fold(event, arrival_ms, HISTORY_CAPACITY)
}

/// Client-side view of the stream: latest record per symbol plus its rolling window.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    latest: IndexMap<String, Instrument>,
    series: HashMap<String, HistorySeries>,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            latest: IndexMap::new(),
            series: HashMap::new(),
        }
    }

    /// Pre-create empty windows for every known symbol.
    pub fn with_symbols<I, S>(capacity: usize, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buffer = Self::new(capacity);
        for symbol in symbols {
            buffer.series.entry(symbol.into()).or_default();
        }
        buffer
    }

    /// Fold a stream message received at `arrival_ms`.
    pub fn apply(&mut self, event: &StreamEvent, arrival_ms: u64) {
        match event {
            StreamEvent::InitialData(instruments) => {
                for instrument in instruments {
                    self.series.entry(instrument.symbol.clone()).or_default();
                    self.latest
                        .insert(instrument.symbol.clone(), instrument.clone());
                }
            }
            StreamEvent::PriceUpdate(tick) => self.ingest(tick, arrival_ms),
        }
    }

    /// Fold one tick, creating the symbol's window on first sight.
    pub fn ingest(&mut self, tick: &TickEvent, arrival_ms: u64) {
        let series = self.series.entry(tick.symbol.clone()).or_default();
        *series = mem::take(series).fold(tick, arrival_ms, self.capacity);

        let latest = self
            .latest
            .entry(tick.symbol.clone())
            .or_insert_with(|| Instrument {
                symbol: tick.symbol.clone(),
                name: tick.symbol.clone(),
                price: tick.price,
                change: tick.change,
                percent_change: tick.percent_change,
                volume: tick.volume,
                last_updated_ms: arrival_ms,
            });
        latest.price = tick.price;
        latest.change = tick.change;
        latest.percent_change = tick.percent_change;
        latest.volume = tick.volume;
        latest.last_updated_ms = arrival_ms;
    }

    pub fn latest(&self) -> &IndexMap<String, Instrument> {
        &self.latest
    }

    pub fn series_for(&self, symbol: &str) -> Option<&HistorySeries> {
        self.series.get(symbol)
    }

    pub fn display_name<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.latest
            .get(symbol)
            .map(|instrument| instrument.name.as_str())
            .unwrap_or(symbol)
    }

    /// Top advancers and decliners by percent move across each symbol's window.
    pub fn movers(&self, count: usize) -> (Movers, Movers) {
        if count == 0 {
            return (Vec::new(), Vec::new());
        }

        let mut changes: Vec<(String, f64)> = self
            .series
            .iter()
            .filter_map(|(symbol, series)| {
                series
                    .window_change_percent()
                    .map(|change| (symbol.clone(), change))
            })
            .collect();
        changes.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let advancers = changes
            .iter()
            .filter(|(_, change)| *change > 0.0)
            .take(count)
            .cloned()
            .collect();
        let decliners = changes
            .iter()
            .rev()
            .filter(|(_, change)| *change < 0.0)
            .take(count)
            .cloned()
            .collect();

        (advancers, decliners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(symbol: &str, price: f64, volume: u64) -> TickEvent {
        TickEvent {
            symbol: symbol.to_string(),
            price,
            change: 0.0,
            percent_change: 0.0,
            volume,
        }
    }

    #[test]
    fn fold_grows_until_capacity_then_slides() {
        let mut series = HistorySeries::default();
        for step in 0..HISTORY_CAPACITY as u64 {
            let before = series.len();
            series = fold(series, &tick("SM", 100.0 + step as f64, step), step);
            assert_eq!(series.len(), before + 1);
        }

        series = fold(series, &tick("SM", 500.0, 999), 999);
        assert_eq!(series.len(), HISTORY_CAPACITY);
        assert_eq!(series.timestamps().front(), Some(&1));
        assert_eq!(series.prices().front(), Some(&101.0));
        assert_eq!(series.prices().back(), Some(&500.0));
        assert_eq!(series.volumes().back(), Some(&999));
    }

    #[test]
    fn parallel_sequences_stay_equal_length() {
        let mut series = HistorySeries::default();
        for step in 0..75u64 {
            series = series.fold(&tick("AC", 800.0, step), step, 7);
            assert_eq!(series.timestamps().len(), series.prices().len());
            assert_eq!(series.prices().len(), series.volumes().len());
            assert!(series.len() <= 7);
        }
    }

    #[test]
    fn ingest_initializes_unknown_symbols_lazily() {
        let mut buffer = HistoryBuffer::default();
        assert!(buffer.series_for("JFC").is_none());

        buffer.ingest(&tick("JFC", 245.0, 70_000), 10);
        let series = buffer.series_for("JFC").expect("series created");
        assert_eq!(series.len(), 1);
        assert_eq!(buffer.display_name("JFC"), "JFC");
    }

    #[test]
    fn initial_data_seeds_latest_without_history_points() {
        let mut buffer = HistoryBuffer::with_symbols(HISTORY_CAPACITY, ["SM"]);
        let instrument = Instrument {
            symbol: "TEL".into(),
            name: "PLDT Inc.".into(),
            price: 1234.0,
            change: 0.0,
            percent_change: 0.0,
            volume: 45_000,
            last_updated_ms: 1,
        };
        buffer.apply(&StreamEvent::InitialData(vec![instrument]), 5);

        assert_eq!(buffer.display_name("TEL"), "PLDT Inc.");
        assert!(buffer.series_for("TEL").expect("tel series").is_empty());
        assert!(buffer.series_for("SM").expect("sm series").is_empty());

        buffer.apply(&StreamEvent::PriceUpdate(tick("TEL", 1240.0, 50_000)), 6);
        assert_eq!(buffer.latest().get("TEL").map(|i| i.price), Some(1240.0));
        assert_eq!(buffer.display_name("TEL"), "PLDT Inc.");
    }

    #[test]
    fn movers_rank_window_changes() {
        let mut buffer = HistoryBuffer::new(8);
        buffer.ingest(&tick("AAA", 10.0, 1), 1);
        buffer.ingest(&tick("AAA", 11.0, 1), 2);
        buffer.ingest(&tick("BBB", 20.0, 1), 1);
        buffer.ingest(&tick("BBB", 18.0, 1), 2);
        buffer.ingest(&tick("CCC", 30.0, 1), 1);
        buffer.ingest(&tick("CCC", 39.0, 1), 2);

        let (advancers, decliners) = buffer.movers(2);
        assert_eq!(advancers.len(), 2);
        assert_eq!(advancers[0].0, "CCC");
        assert_eq!(advancers[1].0, "AAA");
        assert_eq!(decliners.len(), 1);
        assert_eq!(decliners[0].0, "BBB");
    }
}
