//! wearflow: intraday wearable ingestion, multi-resolution queries and gap filling
//!
//! - `auth` - OAuth credential lifecycle
//! - `vendor` - vendor HTTP access, retries, payload normalization
//! - `ingest` - delta-load controller with cursor and run-lock
//! - `store` - SQLite raw / rollup / imputed tables
//! - `query` - resolution-aware range queries
//! - `imputation` - per-metric-class gap filling
//! - `api` - axum HTTP surface

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod imputation;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod sqlite_pragma;
pub mod store;
pub mod synthetic;
pub mod time;
pub mod vendor;
