//! API Server - query and imputation HTTP service
//!
//! Usage:
//!   cargo run --release --bin api_server
//!
//! Environment variables:
//!   WEARFLOW_DB_PATH - SQLite database path (default: data/wearflow.db)
//!   API_BIND_ADDR - listen address (default: 0.0.0.0:8000)
//!   QUERY_POINT_BUDGET - max points per routed query (default: 1440)
//!   IMPUTATION_TIMEOUT_MS - model fitting timeout (default: 10000)

use dotenv::dotenv;
use log::info;
use wearflow::api::{router, AppState};
use wearflow::config::AppConfig;
use wearflow::imputation::ImputationEngine;
use wearflow::query::QueryRouter;
use wearflow::store::TimeSeriesStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;

    info!("🚀 API Server");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Point budget: {}", config.point_budget);
    info!(
        "   └─ Imputation: min {} samples, AR order {}, timeout {}ms",
        config.imputation.min_samples, config.imputation.ar_order, config.imputation.timeout_ms
    );

    let store = TimeSeriesStore::open(&config.db_path)?;
    let state = AppState::new(
        QueryRouter::new(store.clone(), config.catalog.clone(), config.point_budget),
        ImputationEngine::new(store, config.catalog.clone(), config.imputation.clone()),
    );

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    info!("✅ Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("🛑 Shutting down");
        })
        .await?;

    Ok(())
}
