//! Response bodies and error mapping

use crate::error::{CoreError, ImputationError};
use crate::imputation::ImputationSummary;
use crate::query::{QueryPage, Resolution};
use crate::time::format_timestamp;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataRow {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub participant_id: String,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub is_imputed: bool,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: Vec<DataRow>,
    pub total_count: i64,
    pub resolution: Resolution,
}

impl From<QueryPage> for DataResponse {
    fn from(page: QueryPage) -> Self {
        Self {
            data: page
                .rows
                .into_iter()
                .map(|row| DataRow {
                    timestamp: format_timestamp(row.timestamp),
                    participant_id: row.participant_id,
                    value_numeric: row.value_numeric,
                    value_text: row.value_text,
                    is_imputed: row.is_imputed,
                })
                .collect(),
            total_count: page.total_count,
            resolution: page.resolution,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImputationResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub summary: ImputationSummary,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// `CoreError` rendered as `{"error": {"code", "message"}}`
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Imputation(ImputationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Imputation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Auth(_) | CoreError::VendorApi(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("❌ {} ({}): {}", status, self.0.code().as_str(), self.0);
        } else {
            log::warn!("⚠️  {} ({}): {}", status, self.0.code().as_str(), self.0);
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().as_str(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError(CoreError::validation("x")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(CoreError::Storage(StorageError::LockPoisoned)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(ImputationError::Timeout { after_ms: 5 }.into()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError(ImputationError::NonConvergence("x".to_string()).into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
