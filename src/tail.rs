use anyhow::Result;
use clap::Args;

use crate::client::EventStream;
use crate::clock::current_timestamp_ms;
use crate::constants::DEFAULT_STREAM_URL;
use crate::history::{HistoryBuffer, HistorySeries};
use crate::tick::StreamEvent;

#[derive(Debug, Args, Clone)]
pub struct TailArgs {
    /// Websocket URL of the live feed
    #[arg(long, default_value = DEFAULT_STREAM_URL)]
    pub url: String,

    /// Filter updates to a single symbol (e.g. SM)
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Stop after printing this many updates
    #[arg(short, long)]
    pub limit: Option<usize>,
}

pub async fn run(args: TailArgs) -> Result<()> {
    let mut stream = EventStream::connect(&args.url).await?;
    let mut history = HistoryBuffer::default();
    let mut printed = 0usize;
    println!("Connected to {}; streaming updates...", args.url);

    while let Some(event) = stream.next_event().await? {
        let arrival_ms = current_timestamp_ms();
        history.apply(&event, arrival_ms);

        let StreamEvent::PriceUpdate(tick) = &event else {
            println!("Baseline received for {} instruments", history.latest().len());
            continue;
        };
        if let Some(ref filter) = args.symbol {
            if filter != &tick.symbol {
                continue;
            }
        }

        let window = history
            .series_for(&tick.symbol)
            .map_or(0, HistorySeries::len);
        println!(
            "{:>13} | {:>6} | {:<36.36} | {:>10.2} | {:>+8.2} | {:>+6.2}% | {:>7} | {:>2}",
            arrival_ms,
            tick.symbol,
            history.display_name(&tick.symbol),
            tick.price,
            tick.change,
            tick.percent_change,
            tick.volume,
            window
        );
        printed += 1;

        if let Some(limit) = args.limit {
            if printed >= limit {
                break;
            }
        }
    }

    stream.close().await.ok();
    Ok(())
}
