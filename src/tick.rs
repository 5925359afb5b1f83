use serde::{Deserialize, Serialize};

use crate::model::Instrument;

/// One instrument's update for a single pass, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickEvent {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: u64,
}

impl From<&Instrument> for TickEvent {
    fn from(instrument: &Instrument) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            price: instrument.price,
            change: instrument.change,
            percent_change: instrument.percent_change,
            volume: instrument.volume,
        }
    }
}

/// Server to client message, tagged by event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    InitialData(Vec<Instrument>),
    PriceUpdate(TickEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    InitialData,
    PriceUpdate,
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::InitialData(_) => EventKind::InitialData,
            StreamEvent::PriceUpdate(_) => EventKind::PriceUpdate,
        }
    }
}
