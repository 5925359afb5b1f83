use anyhow::Result;
use clap::Parser;
use pse_realtime::chart;
use pse_realtime::cli::{self, Cli};
use pse_realtime::simulator;
use pse_realtime::tail;

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command() {
        cli::Command::Run(args) => simulator::run_with_config(args.into_config()).await,
        cli::Command::Tail(args) => tail::run(args).await,
        cli::Command::Chart(args) => chart::run(args).await,
    }
}
