//! Rollup Refresh - rebuild 1m / 1h / 1d rollups from raw data
//!
//! Rebuilds every bucket overlapping `[now - ROLLUP_LOOKBACK_SECS, now]`. Schedule it
//! externally; queries tolerate rollups lagging by one refresh interval.
//!
//! Usage:
//!   cargo run --release --bin rollup_refresh
//!   cargo run --release --bin rollup_refresh -- --since 2025-06-01

use dotenv::dotenv;
use log::info;
use std::env;
use wearflow::config::AppConfig;
use wearflow::store::{RollupResolution, TimeSeriesStore};
use wearflow::time::parse_query_time;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let now = chrono::Utc::now().timestamp();

    let args: Vec<String> = env::args().collect();
    let since = match args.iter().position(|a| a == "--since") {
        Some(idx) => {
            let value = args.get(idx + 1).ok_or("--since needs a date")?;
            parse_query_time(value, false)?
        }
        None => now - config.rollup_lookback_secs,
    };

    info!("🚀 Rollup Refresh");
    info!("   ├─ Database: {}", config.db_path);
    info!("   └─ Range: [{}, {}]", since, now);

    let store = TimeSeriesStore::open(&config.db_path)?;
    for resolution in RollupResolution::ALL {
        let buckets = store.refresh_rollups(resolution, since, now)?;
        info!("   ├─ {}: {} buckets", resolution, buckets);
    }

    info!("✅ Rollups refreshed");
    Ok(())
}
