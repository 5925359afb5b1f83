use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::chart::ChartArgs;
use crate::simulator::SimulatorConfig;
use crate::tail::TailArgs;

#[derive(Debug, Parser)]
#[command(author, version, about = "Simulated PSEi real-time price feed")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(self) -> Command {
        self.command.unwrap_or_default()
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the tick generator, websocket gateway and snapshot endpoint
    Run(RunArgs),
    /// Subscribe to the live feed and print incoming updates
    Tail(TailArgs),
    /// Collect updates and render an ASCII price chart of one symbol
    Chart(ChartArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Run(RunArgs::default())
    }
}

#[derive(Debug, Args, Clone, Default)]
pub struct RunArgs {
    /// Websocket gateway bind address
    #[arg(long)]
    pub gateway_addr: Option<SocketAddr>,

    /// Snapshot endpoint bind address
    #[arg(long)]
    pub snapshot_addr: Option<SocketAddr>,

    /// Seconds between tick passes
    #[arg(long)]
    pub tick_interval_secs: Option<u64>,

    /// Stop after this many tick passes
    #[arg(long)]
    pub max_ticks: Option<usize>,

    /// Do not start the snapshot endpoint
    #[arg(long)]
    pub no_snapshot: bool,

    /// Query Yahoo Finance before falling back to simulated snapshot quotes
    #[arg(long)]
    pub external_quotes: bool,

    /// Do not emit periodic throughput summaries
    #[arg(long)]
    pub no_metrics: bool,
}

impl RunArgs {
    pub fn into_config(self) -> SimulatorConfig {
        let defaults = SimulatorConfig::default();
        SimulatorConfig {
            gateway_addr: self.gateway_addr.unwrap_or(defaults.gateway_addr),
            snapshot_addr: self.snapshot_addr.unwrap_or(defaults.snapshot_addr),
            tick_interval: self
                .tick_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.tick_interval),
            max_ticks: self.max_ticks,
            enable_snapshot: !self.no_snapshot,
            enable_metrics: !self.no_metrics,
            external_quotes: self.external_quotes,
            ..defaults
        }
    }
}
