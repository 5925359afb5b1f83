pub const GATEWAY_BIND_ADDR: &str = "127.0.0.1:4000";
pub const GATEWAY_WS_PATH: &str = "/ws";
pub const SNAPSHOT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const SNAPSHOT_PATH: &str = "/api/stocks";

pub const TICK_INTERVAL_SECS: u64 = 10;
pub const METRICS_INTERVAL_SECS: u64 = 60;

/// Half-width of the uniform percent draw for the live feed.
pub const LIVE_SWING_PERCENT: f64 = 0.75;
/// Half-width of the uniform percent draw for the snapshot endpoint.
pub const SNAPSHOT_SWING_PERCENT: f64 = 1.0;
pub const VOLUME_MIN: u64 = 10_000;
pub const VOLUME_MAX: u64 = 210_000;
pub const PRICE_FLOOR: f64 = 0.01;

pub const HISTORY_CAPACITY: usize = 30;

pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;
pub const SUBSCRIBER_SEND_TIMEOUT_MS: u64 = 2_000;

/// Overall deadline for one snapshot's external fetch.
pub const SNAPSHOT_FETCH_TIMEOUT_MS: u64 = 5_000;
/// Per-symbol budget inside that deadline.
pub const PROVIDER_REQUEST_TIMEOUT_MS: u64 = 3_000;
pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const YAHOO_SYMBOL_SUFFIX: &str = ".PS";

pub const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:4000/ws";
