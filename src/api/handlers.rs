use super::response::{ApiError, DataResponse, ImputationResponse};
use super::AppState;
use crate::error::{CoreError, StorageError};
use crate::metrics::MetricType;
use crate::query::{QueryMode, QueryPage, QueryRequest};
use crate::time::parse_query_time;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;

/// Raw query string; parsed by hand so malformed values get the JSON error body
#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    pub metric: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImputationParams {
    pub user_id: Option<String>,
    pub metric: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, CoreError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::validation(format!("{} is required", name))),
    }
}

fn parse_time(value: &str, name: &str, is_end: bool) -> Result<i64, CoreError> {
    parse_query_time(value, is_end).map_err(|e| CoreError::validation(format!("{}: {}", name, e)))
}

fn parse_int(value: &Option<String>, name: &str, default: i64) -> Result<i64, CoreError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse::<i64>()
            .map_err(|_| CoreError::validation(format!("{} must be an integer, got '{}'", name, v))),
    }
}

fn build_request(params: &DataParams, mode: QueryMode) -> Result<QueryRequest, CoreError> {
    let start = parse_time(required(&params.start_date, "start_date")?, "start_date", false)?;
    let end = parse_time(required(&params.end_date, "end_date")?, "end_date", true)?;

    Ok(QueryRequest {
        participant_id: required(&params.user_id, "user_id")?.to_string(),
        metric: required(&params.metric, "metric")?.to_string(),
        start,
        end,
        limit: parse_int(&params.limit, "limit", DEFAULT_LIMIT)?,
        offset: parse_int(&params.offset, "offset", 0)?,
        resolution: params
            .resolution
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        mode,
    })
}

async fn serve(
    state: AppState,
    params: DataParams,
    mode: QueryMode,
) -> Result<Json<DataResponse>, ApiError> {
    let request = build_request(&params, mode)?;
    let router = state.router.clone();

    // SQLite reads are blocking
    let page: QueryPage = tokio::task::spawn_blocking(move || router.query(&request))
        .await
        .map_err(|e| CoreError::Storage(StorageError::Interrupted(e.to_string())))??;

    Ok(Json(page.into()))
}

pub async fn get_data(
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> Result<Json<DataResponse>, ApiError> {
    serve(state, params, QueryMode::Observed).await
}

pub async fn get_imputed_data(
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> Result<Json<DataResponse>, ApiError> {
    serve(state, params, QueryMode::Imputed).await
}

pub async fn run_imputation(
    State(state): State<AppState>,
    Query(params): Query<ImputationParams>,
) -> Result<Json<ImputationResponse>, ApiError> {
    let participant_id = required(&params.user_id, "user_id")?.to_string();
    let metric = required(&params.metric, "metric")?
        .parse::<MetricType>()
        .map_err(CoreError::Validation)?;

    let start = match params.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(v) => Some(parse_time(v, "start_date", false)?),
        None => None,
    };
    let end = match params.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(v) => Some(parse_time(v, "end_date", true)?),
        None => None,
    };

    // Missing bounds default to the pair's observed extent
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (s, e) => {
            let extent = state.engine.observed_extent(&participant_id, metric).await?;
            match extent {
                Some((first, last)) => (s.unwrap_or(first), e.unwrap_or(last)),
                // No observations at all: an empty run over the given bound
                None => {
                    let bound = s.or(e).unwrap_or(0);
                    (bound, bound)
                }
            }
        }
    };

    let summary = state.engine.run(&participant_id, metric, start, end).await?;

    Ok(Json(ImputationResponse {
        status: "success",
        summary,
    }))
}

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
