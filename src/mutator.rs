use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use crate::constants::{
    LIVE_SWING_PERCENT, PRICE_FLOOR, SNAPSHOT_SWING_PERCENT, VOLUME_MAX, VOLUME_MIN,
};
use crate::model::Instrument;

/// Tuning of one random-walk feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutatorConfig {
    /// Half-width of the uniform percent draw.
    pub swing_percent: f64,
    /// Inclusive lower volume bound.
    pub volume_min: u64,
    /// Exclusive upper volume bound.
    pub volume_max: u64,
    pub price_floor: f64,
}

impl MutatorConfig {
    pub fn live() -> Self {
        Self {
            swing_percent: LIVE_SWING_PERCENT,
            volume_min: VOLUME_MIN,
            volume_max: VOLUME_MAX,
            price_floor: PRICE_FLOOR,
        }
    }

    pub fn snapshot() -> Self {
        Self {
            swing_percent: SNAPSHOT_SWING_PERCENT,
            ..Self::live()
        }
    }
}

/// Result of one mutation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: u64,
}

impl Quote {
    pub fn is_valid(&self) -> bool {
        self.price.is_finite()
            && self.price > 0.0
            && self.change.is_finite()
            && self.percent_change.is_finite()
    }

    pub fn apply_to(&self, instrument: &mut Instrument, timestamp_ms: u64) {
        instrument.price = self.price;
        instrument.change = self.change;
        instrument.percent_change = self.percent_change;
        instrument.volume = self.volume;
        instrument.last_updated_ms = timestamp_ms;
    }
}

/// Strategy producing the next quote from the current price.
pub trait PriceMutator: Send {
    fn mutate(&mut self, current_price: f64) -> Quote;
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic core of every mutation: apply `percent` to `price`, round to cents,
/// and keep the result at or above `floor`.
///
/// Non-finite results are returned unclamped so `Quote::is_valid` rejects them.
pub fn quote_from_draw(price: f64, percent: f64, volume: u64, floor: f64) -> Quote {
    let change = round2(price * percent / 100.0);
    let next = round2(price + change);

    if !next.is_finite() || next >= floor {
        return Quote {
            price: next,
            change,
            percent_change: round2(percent),
            volume,
        };
    }

    let realized = round2(floor - price);
    let realized_percent = if price > 0.0 {
        round2(realized / price * 100.0)
    } else {
        0.0
    };
    Quote {
        price: floor,
        change: realized,
        percent_change: realized_percent,
        volume,
    }
}

/// Uniform random walk used by both feeds.
pub struct RandomWalkMutator<R> {
    config: MutatorConfig,
    percent: Option<Uniform<f64>>,
    volume: Uniform<u64>,
    rng: R,
}

impl RandomWalkMutator<StdRng> {
    pub fn from_entropy(config: MutatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: MutatorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> RandomWalkMutator<R> {
    pub fn with_rng(config: MutatorConfig, rng: R) -> Self {
        let swing = config.swing_percent.abs();
        let percent = (swing.is_finite() && swing > 0.0).then(|| Uniform::new(-swing, swing));
        let volume_max = config.volume_max.max(config.volume_min.saturating_add(1));
        Self {
            config,
            percent,
            volume: Uniform::new(config.volume_min, volume_max),
            rng,
        }
    }

    pub fn config(&self) -> &MutatorConfig {
        &self.config
    }
}

impl<R: Rng + Send> PriceMutator for RandomWalkMutator<R> {
    fn mutate(&mut self, current_price: f64) -> Quote {
        let percent = match &self.percent {
            Some(distribution) => distribution.sample(&mut self.rng),
            None => 0.0,
        };
        let volume = self.volume.sample(&mut self.rng);
        quote_from_draw(current_price, percent, volume, self.config.price_floor)
    }
}

/// Applies the same percent and volume on every call.
#[derive(Debug, Clone, Copy)]
pub struct FixedMutator {
    pub percent: f64,
    pub volume: u64,
}

impl PriceMutator for FixedMutator {
    fn mutate(&mut self, current_price: f64) -> Quote {
        quote_from_draw(current_price, self.percent, self.volume, PRICE_FLOOR)
    }
}
