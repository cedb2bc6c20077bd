//! Synthetic Data - populate raw_data without the vendor API
//!
//! Usage:
//!   cargo run --bin synthetic_data
//!   cargo run --bin synthetic_data -- --from 2025-06-01 --to 2025-06-30 --seed 7
//!
//! Rows are written for FITBIT_USER_ID (default: test_participant_1) and upserted, so
//! rerunning with the same seed is a no-op.

use chrono::NaiveDate;
use dotenv::dotenv;
use log::info;
use std::env;
use wearflow::config::AppConfig;
use wearflow::store::TimeSeriesStore;
use wearflow::synthetic::SyntheticGenerator;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let args: Vec<String> = env::args().collect();

    let first = NaiveDate::parse_from_str(arg_value(&args, "--from").unwrap_or("2025-06-01"), "%Y-%m-%d")?;
    let last = NaiveDate::parse_from_str(arg_value(&args, "--to").unwrap_or("2025-06-30"), "%Y-%m-%d")?;
    let seed: u64 = arg_value(&args, "--seed").unwrap_or("1").parse()?;
    let participant = match config.fallback_user_id.as_str() {
        "-" => "test_participant_1".to_string(),
        other => other.to_string(),
    };

    info!("🚀 Synthetic Data");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Participant: {}", participant);
    info!("   └─ Days: {} to {} (seed {})", first, last, seed);

    let points = SyntheticGenerator::with_seed(seed).generate(&participant, first, last);
    let store = TimeSeriesStore::open(&config.db_path)?;
    let written = store.upsert_raw(&points)?;

    info!("✅ Wrote {} rows", written);
    Ok(())
}
