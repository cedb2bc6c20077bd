//! Deployment configuration
//!
//! Read from environment variables (a `.env` file is loaded first by each binary).
//! Every variable has a default except the OAuth client credentials, which only the
//! ingestion and authorization binaries require.

use crate::imputation::ImputationSettings;
use crate::ingest::IngestSettings;
use crate::metrics::{DetailLevel, MetricCatalog, MetricType, Resource};
use crate::query::DEFAULT_POINT_BUDGET;
use crate::vendor::client::DEFAULT_API_BASE_URL;
use crate::vendor::RetryPolicy;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub token_file: String,
    pub lock_file: String,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub api_base_url: String,
    pub token_url: String,
    /// Participant id when the credential carries none
    pub fallback_user_id: String,

    pub metrics: Vec<MetricType>,
    pub catalog: MetricCatalog,
    pub safety_lag_secs: i64,
    pub initial_lookback_secs: i64,
    pub token_margin_secs: i64,
    pub vendor_retry: RetryPolicy,
    pub run_lock_stale_secs: i64,

    pub point_budget: i64,
    pub imputation: ImputationSettings,
    pub rollup_lookback_secs: i64,
    pub api_bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string_or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let metrics = match var("INGEST_METRICS") {
            Some(list) => {
                let mut metrics = Vec::new();
                for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    let metric = name
                        .parse::<MetricType>()
                        .map_err(|e| ConfigError::InvalidValue(format!("INGEST_METRICS: {}", e)))?;
                    if !metrics.contains(&metric) {
                        metrics.push(metric);
                    }
                }
                if metrics.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "INGEST_METRICS lists no metrics".to_string(),
                    ));
                }
                metrics
            }
            None => MetricType::ALL.to_vec(),
        };

        let mut detail_overrides = HashMap::new();
        for (name, resource) in [
            ("HEART_DETAIL_LEVEL", Resource::Heart),
            ("STEPS_DETAIL_LEVEL", Resource::Steps),
            ("CALORIES_DETAIL_LEVEL", Resource::Calories),
        ] {
            if let Some(value) = var(name) {
                let level = value
                    .parse::<DetailLevel>()
                    .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e)))?;
                detail_overrides.insert(resource, level);
            }
        }
        let catalog = MetricCatalog::resolve(&metrics, &detail_overrides)
            .map_err(ConfigError::InvalidValue)?;

        let vendor_retry = RetryPolicy {
            max_attempts: parse_or(&var, "VENDOR_MAX_ATTEMPTS", 4u32)?.max(1),
            initial_delay_ms: parse_or(&var, "VENDOR_BACKOFF_INITIAL_MS", 500u64)?,
            max_delay_ms: parse_or(&var, "VENDOR_BACKOFF_MAX_MS", 8_000u64)?,
        };

        let imputation = ImputationSettings {
            min_samples: parse_or(&var, "IMPUTATION_MIN_SAMPLES", 12usize)?.max(1),
            ar_order: parse_or(&var, "IMPUTATION_AR_ORDER", 5usize)?,
            timeout_ms: parse_or(&var, "IMPUTATION_TIMEOUT_MS", 10_000u64)?,
            max_grid_points: parse_or(&var, "IMPUTATION_MAX_GRID_POINTS", 200_000usize)?,
        };

        let point_budget = parse_or(&var, "QUERY_POINT_BUDGET", DEFAULT_POINT_BUDGET)?;
        if point_budget <= 0 {
            return Err(ConfigError::InvalidValue(
                "QUERY_POINT_BUDGET must be positive".to_string(),
            ));
        }

        let api_base_url = string_or("FITBIT_API_BASE_URL", DEFAULT_API_BASE_URL);
        let token_url = string_or("FITBIT_TOKEN_URL", crate::auth::endpoint::DEFAULT_TOKEN_URL);
        for (name, url) in [("FITBIT_API_BASE_URL", &api_base_url), ("FITBIT_TOKEN_URL", &token_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        Ok(Self {
            db_path: string_or("WEARFLOW_DB_PATH", "data/wearflow.db"),
            token_file: string_or("WEARFLOW_TOKEN_FILE", "data/fitbit_tokens.json"),
            lock_file: string_or("WEARFLOW_LOCK_FILE", "data/delta_load.lock"),
            client_id: var("FITBIT_CLIENT_ID"),
            client_secret: var("FITBIT_CLIENT_SECRET"),
            redirect_uri: string_or("FITBIT_REDIRECT_URI", "http://localhost:8080/callback"),
            api_base_url,
            token_url,
            fallback_user_id: string_or("FITBIT_USER_ID", "-"),
            metrics,
            catalog,
            safety_lag_secs: parse_or(&var, "INGEST_SAFETY_LAG_SECS", 86_400i64)?,
            initial_lookback_secs: parse_or(&var, "INGEST_INITIAL_LOOKBACK_SECS", 7 * 86_400i64)?,
            token_margin_secs: parse_or(&var, "TOKEN_SAFETY_MARGIN_SECS", 60i64)?,
            vendor_retry,
            run_lock_stale_secs: parse_or(&var, "RUN_LOCK_STALE_SECS", 6 * 3_600i64)?,
            point_budget,
            imputation,
            rollup_lookback_secs: parse_or(&var, "ROLLUP_LOOKBACK_SECS", 2 * 86_400i64)?,
            api_bind_addr: string_or("API_BIND_ADDR", "0.0.0.0:8000"),
        })
    }

    /// OAuth client id and secret
    pub fn oauth_client(&self) -> Result<(String, String), ConfigError> {
        let id = self
            .client_id
            .clone()
            .ok_or_else(|| ConfigError::MissingVariable("FITBIT_CLIENT_ID".to_string()))?;
        let secret = self
            .client_secret
            .clone()
            .ok_or_else(|| ConfigError::MissingVariable("FITBIT_CLIENT_SECRET".to_string()))?;
        Ok((id, secret))
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            safety_lag_secs: self.safety_lag_secs,
            initial_lookback_secs: self.initial_lookback_secs,
            storage_retry: self.vendor_retry,
        }
    }
}

fn parse_or<T, V>(var: &V, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{}='{}'", name, value))),
        None => Ok(default),
    }
}
