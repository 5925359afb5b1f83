pub mod chart;
pub mod cli;
pub mod client;
pub mod clock;
pub mod constants;
pub mod error;
pub mod history;
pub mod logging;
pub mod model;
pub mod mutator;
pub mod registry;
pub mod simulator;
pub mod snapshot;
pub mod tail;
pub mod tick;
