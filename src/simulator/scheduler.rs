use serde_json::json;

use crate::logging;
use crate::mutator::PriceMutator;
use crate::registry::InstrumentRegistry;
use crate::tick::TickEvent;

/// Result of one serial pass over the registry.
#[derive(Debug, Default)]
pub struct TickPass {
    pub events: Vec<TickEvent>,
    pub skipped: Vec<String>,
}

/// Applies the injected mutation strategy to every instrument, in registry order.
pub struct TickScheduler {
    mutator: Box<dyn PriceMutator>,
}

impl TickScheduler {
    pub fn new(mutator: Box<dyn PriceMutator>) -> Self {
        Self { mutator }
    }

    pub fn run_pass(&mut self, registry: &mut InstrumentRegistry, timestamp_ms: u64) -> TickPass {
        let mut pass = TickPass {
            events: Vec::with_capacity(registry.len()),
            skipped: Vec::new(),
        };

        for instrument in registry.instruments_mut() {
            let quote = self.mutator.mutate(instrument.price);
            if !quote.is_valid() {
                logging::warn(
                    "tick_generator.rejected_quote",
                    "Mutation produced an unusable quote; instrument left unchanged",
                    json!({
                        "symbol": instrument.symbol,
                        "price": instrument.price,
                        "quote_price": quote.price,
                        "quote_change": quote.change,
                    }),
                );
                pass.skipped.push(instrument.symbol.clone());
                continue;
            }

            quote.apply_to(instrument, timestamp_ms);
            pass.events.push(TickEvent::from(&*instrument));
        }

        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PRICE_FLOOR;
    use crate::mutator::{FixedMutator, MutatorConfig, Quote, RandomWalkMutator};

    struct FaultyMutator {
        calls: usize,
        fail_on: usize,
    }

    impl PriceMutator for FaultyMutator {
        fn mutate(&mut self, current_price: f64) -> Quote {
            self.calls += 1;
            let price = if self.calls == self.fail_on {
                f64::NAN
            } else {
                current_price + 1.0
            };
            Quote {
                price,
                change: 1.0,
                percent_change: 0.1,
                volume: 10_000,
            }
        }
    }

    #[test]
    fn pass_emits_one_event_per_instrument_in_order() {
        let mut registry = InstrumentRegistry::seed();
        let mut scheduler = TickScheduler::new(Box::new(FixedMutator {
            percent: 0.0,
            volume: 12_345,
        }));

        let pass = scheduler.run_pass(&mut registry, 42);
        let symbols: Vec<_> = pass.events.iter().map(|e| e.symbol.clone()).collect();
        assert_eq!(symbols, registry.symbols());
        assert!(pass.skipped.is_empty());
        assert!(registry
            .instruments()
            .iter()
            .all(|i| i.volume == 12_345 && i.last_updated_ms == 42));
    }

    #[test]
    fn rejected_quote_is_isolated_to_its_instrument() {
        let mut registry = InstrumentRegistry::seed();
        let before = registry.snapshot();
        let mut scheduler = TickScheduler::new(Box::new(FaultyMutator {
            calls: 0,
            fail_on: 3,
        }));

        let pass = scheduler.run_pass(&mut registry, 7);
        assert_eq!(pass.events.len(), registry.len() - 1);
        assert_eq!(pass.skipped, vec![before[2].symbol.clone()]);
        assert_eq!(registry.instruments()[2], before[2]);
        assert_eq!(registry.instruments()[3].price, before[3].price + 1.0);
    }

    #[test]
    fn nan_strategy_leaves_every_instrument_unchanged() {
        let mut registry = InstrumentRegistry::seed();
        let before = registry.snapshot();
        let mut scheduler = TickScheduler::new(Box::new(FixedMutator {
            percent: f64::NAN,
            volume: 10_000,
        }));

        let pass = scheduler.run_pass(&mut registry, 9);
        assert!(pass.events.is_empty());
        assert_eq!(pass.skipped.len(), before.len());
        assert_eq!(registry.snapshot(), before);
        assert!(registry.instruments().iter().all(|i| i.price > PRICE_FLOOR));
    }

    #[test]
    fn prices_stay_positive_over_many_passes() {
        let mut registry = InstrumentRegistry::seed();
        let mut scheduler = TickScheduler::new(Box::new(FixedMutator {
            percent: -0.75,
            volume: 10_000,
        }));

        for step in 0..2_000 {
            scheduler.run_pass(&mut registry, step);
        }
        assert!(registry.instruments().iter().all(|i| i.price >= PRICE_FLOOR));

        let mut scheduler =
            TickScheduler::new(Box::new(RandomWalkMutator::seeded(MutatorConfig::live(), 3)));
        for step in 0..2_000 {
            let pass = scheduler.run_pass(&mut registry, step);
            assert!(pass.events.iter().all(|e| e.price > 0.0));
        }
    }
}
