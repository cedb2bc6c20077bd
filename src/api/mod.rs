//! Query-serving HTTP surface
//!
//! - `GET /data` - observed rows at the routed resolution
//! - `GET /data/imputed` - observed + imputed rows, `is_imputed` flagged
//! - `POST /data/run_imputation` - gap-fill one (participant, metric) range
//! - `GET /health`

pub mod handlers;
pub mod response;

use crate::imputation::ImputationEngine;
use crate::query::QueryRouter;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: QueryRouter,
    pub engine: Arc<ImputationEngine>,
}

impl AppState {
    pub fn new(router: QueryRouter, engine: ImputationEngine) -> Self {
        Self {
            router,
            engine: Arc::new(engine),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(handlers::get_data))
        .route("/data/imputed", get(handlers::get_imputed_data))
        .route("/data/run_imputation", post(handlers::run_imputation))
        .route("/health", get(handlers::health))
        .with_state(state)
}
