use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use textplots::{Chart, Plot, Shape};
use tokio::time::{self, Instant};

use crate::client::EventStream;
use crate::clock::current_timestamp_ms;
use crate::constants::{DEFAULT_STREAM_URL, HISTORY_CAPACITY};
use crate::history::{HistoryBuffer, HistorySeries};

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    /// Websocket URL of the live feed
    #[arg(long, default_value = DEFAULT_STREAM_URL)]
    pub url: String,

    /// Number of seconds to collect updates before plotting
    #[arg(short, long, default_value_t = 60)]
    pub duration_secs: u64,

    /// Symbol to plot
    #[arg(short, long, default_value = "SM")]
    pub symbol: String,

    /// Points kept per symbol
    #[arg(long, default_value_t = HISTORY_CAPACITY)]
    pub window: usize,

    /// Chart width in characters
    #[arg(long, default_value_t = 120)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 30)]
    pub height: u32,
}

pub async fn run(args: ChartArgs) -> Result<()> {
    let duration = Duration::from_secs(args.duration_secs);
    let history = collect_history(&args.url, duration, args.window).await?;

    let Some(series) = history.series_for(&args.symbol) else {
        bail!("no updates collected for symbol {}", args.symbol);
    };
    if series.len() < 2 {
        bail!("not enough data points to render a chart; collect for at least two tick intervals");
    }

    render_chart(
        &args.symbol,
        history.display_name(&args.symbol),
        series,
        args.width,
        args.height,
    );
    print_movers(&history);
    Ok(())
}

async fn collect_history(url: &str, duration: Duration, window: usize) -> Result<HistoryBuffer> {
    let mut stream = EventStream::connect(url).await?;
    let mut history = HistoryBuffer::new(window);
    let deadline = Instant::now() + duration;

    println!("Collecting updates for {}s...", duration.as_secs());

    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            break;
        };
        if remaining.is_zero() {
            break;
        }

        match time::timeout(remaining, stream.next_event()).await {
            Ok(next) => match next? {
                Some(event) => history.apply(&event, current_timestamp_ms()),
                None => break,
            },
            Err(_) => break,
        }
    }

    stream.close().await.ok();
    Ok(history)
}

fn render_chart(symbol: &str, name: &str, series: &HistorySeries, width: u32, height: u32) {
    let base = series.timestamps().front().copied().unwrap_or_default();
    let samples: Vec<(f32, f32)> = series
        .timestamps()
        .iter()
        .zip(series.prices())
        .map(|(ts, price)| {
            let elapsed = ts.saturating_sub(base) as f64 / 1000.0;
            (elapsed as f32, *price as f32)
        })
        .collect();

    let min_price = series.prices().iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = series
        .prices()
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let min_volume = series.volumes().iter().min().copied().unwrap_or_default();
    let max_volume = series.volumes().iter().max().copied().unwrap_or_default();
    let max_time = samples.last().map(|(t, _)| *t).unwrap_or_default().max(1e-3);

    println!("{symbol} - {name} ({} points)", series.len());
    println!("Price range: {min_price:.2} → {max_price:.2}");
    println!("Volume range: {min_volume} → {max_volume}");

    Chart::new(width.max(40), height.max(10), 0.0, max_time)
        .lineplot(&Shape::Lines(&samples))
        .display();
    println!();
}

fn print_movers(history: &HistoryBuffer) {
    let (advancers, decliners) = history.movers(3);
    if advancers.is_empty() && decliners.is_empty() {
        return;
    }

    println!("Window movers:");
    for (symbol, change) in advancers.iter().chain(decliners.iter()) {
        println!("  {symbol:>6} {change:>+7.2}%  {}", history.display_name(symbol));
    }
}
