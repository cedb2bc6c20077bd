//! Delta Load - one ingestion run per invocation
//!
//! Meant to be triggered by an external scheduler (cron, systemd timer). Overlapping
//! invocations are skipped through the run-lock file.
//!
//! Usage:
//!   cargo run --release --bin delta_load
//!
//! Environment variables:
//!   FITBIT_CLIENT_ID / FITBIT_CLIENT_SECRET - OAuth client (required)
//!   WEARFLOW_DB_PATH - SQLite database path (default: data/wearflow.db)
//!   WEARFLOW_TOKEN_FILE - credential file (default: data/fitbit_tokens.json)
//!   WEARFLOW_LOCK_FILE - run-lock file (default: data/delta_load.lock)
//!   INGEST_METRICS - comma-separated metric list (default: all)
//!
//! Exit status is non-zero when the run failed; the cursor is unchanged in that case.

use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;
use wearflow::auth::{FileTokenStore, HttpTokenEndpoint, OAuthTokenManager};
use wearflow::config::AppConfig;
use wearflow::ingest::{DeltaLoadController, RunLock, RunOutcome};
use wearflow::store::TimeSeriesStore;
use wearflow::time::system_clock;
use wearflow::vendor::{HttpVendorClient, VendorIngestClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let (client_id, client_secret) = config.oauth_client()?;

    info!("🚀 Delta Load");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Credentials: {}", config.token_file);
    info!(
        "   └─ Metrics: {}",
        config
            .metrics
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let clock = system_clock();
    let store = TimeSeriesStore::open(&config.db_path)?;

    let tokens = Arc::new(OAuthTokenManager::new(
        Arc::new(FileTokenStore::new(&config.token_file)),
        Arc::new(HttpTokenEndpoint::new(
            config.token_url.clone(),
            client_id,
            client_secret,
            config.redirect_uri.clone(),
        )?),
        config.token_margin_secs,
        clock.clone(),
    ));

    let client = VendorIngestClient::new(
        Arc::new(HttpVendorClient::new(config.api_base_url.clone())?),
        tokens,
        config.vendor_retry,
        config.fallback_user_id.clone(),
    );

    let controller = DeltaLoadController::new(
        store,
        client,
        config.catalog.clone(),
        &config.metrics,
        config.ingest_settings(),
        RunLock::with_file(&config.lock_file, config.run_lock_stale_secs, clock.clone()),
        clock,
    );

    match controller.run_once().await {
        RunOutcome::Completed { rows_written, cursor, .. } => {
            info!("✅ Run complete: {} rows, cursor {}", rows_written, cursor);
            Ok(())
        }
        RunOutcome::Skipped => {
            info!("⏭️  Another run is in progress, nothing to do");
            Ok(())
        }
        RunOutcome::Failed { reason } => {
            error!("❌ Run failed: {}", reason);
            Err(reason.into())
        }
    }
}
