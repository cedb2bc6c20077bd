//! Integration tests for the HTTP surface
//!
//! Requests go through the full axum router (`tower::ServiceExt::oneshot`) backed by
//! an in-memory store.
//!
//! Key integration points tested:
//! - Pagination partitions a range with a stable total_count
//! - Resolution routing switches to rollups for long spans
//! - Validation failures come back as 400 with the JSON error body
//! - Imputation runs are visible through /data/imputed
//! - Insufficient data is a 422 that leaves stored rows untouched

#[cfg(test)]
mod api_integration_tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;
    use wearflow::api::{router, AppState};
    use wearflow::imputation::{ImputationEngine, ImputationSettings};
    use wearflow::metrics::{MetricCatalog, MetricType};
    use wearflow::query::QueryRouter;
    use wearflow::store::{RawPoint, RollupResolution, SeriesKey, TimeSeriesStore};
    use wearflow::time::format_timestamp;

    /// 2025-06-01T12:00:00Z
    const T0: i64 = 1_748_779_200;
    const T0_STR: &str = "2025-06-01T12:00:00Z";

    fn app(points: &[RawPoint]) -> (Router, TimeSeriesStore) {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        store.upsert_raw(points).unwrap();

        let state = AppState::new(
            QueryRouter::new(store.clone(), MetricCatalog::with_defaults(), 1_440),
            ImputationEngine::new(
                store.clone(),
                MetricCatalog::with_defaults(),
                ImputationSettings::default(),
            ),
        );
        (router(state), store)
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn heart_rate_points() -> Vec<RawPoint> {
        (1..=10)
            .map(|i| RawPoint::numeric(T0 + i, "p1", MetricType::HeartRate, 60.0 + i as f64))
            .collect()
    }

    fn timestamps(body: &Value) -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["timestamp"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(&[]);
        let (status, body) = send(&app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_pagination_partitions_range() {
        let (app, _) = app(&heart_rate_points());
        let base = format!(
            "/data?user_id=p1&metric=heart_rate&start_date={}&end_date=2025-06-01T12:00:10Z&limit=5",
            T0_STR
        );

        let (status, first) = send(&app, "GET", &format!("{}&offset=0", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["total_count"], 10);
        assert_eq!(first["resolution"], "raw");
        assert_eq!(first["data"].as_array().unwrap().len(), 5);

        let (_, second) = send(&app, "GET", &format!("{}&offset=5", base)).await;
        assert_eq!(second["total_count"], 10);

        let mut all = timestamps(&first);
        all.extend(timestamps(&second));
        let expected: Vec<String> = (1..=10).map(|i| format_timestamp(T0 + i)).collect();
        assert_eq!(all, expected);

        let row = &first["data"][0];
        assert_eq!(row["participant_id"], "p1");
        assert_eq!(row["value_numeric"], 61.0);
        assert_eq!(row["is_imputed"], false);
    }

    #[tokio::test]
    async fn test_day_span_routes_to_minute_rollup() {
        let points: Vec<RawPoint> = (0..120)
            .map(|s| RawPoint::numeric(T0 + s, "p1", MetricType::HeartRate, if s < 60 { 60.0 } else { 80.0 }))
            .collect();
        let (app, store) = app(&points);
        store
            .refresh_rollups(RollupResolution::Minute, T0 - 86_400, T0 + 86_400)
            .unwrap();

        let (status, body) = send(
            &app,
            "GET",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-01&limit=10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resolution"], "1m");
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["data"][0]["value_numeric"], 60.0);
        assert_eq!(body["data"][1]["value_numeric"], 80.0);

        // An explicit hint pins the resolution
        let (status, body) = send(
            &app,
            "GET",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-01&limit=10&resolution=raw",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resolution"], "raw");
        assert_eq!(body["total_count"], 120);
    }

    #[tokio::test]
    async fn test_validation_errors_are_400_json() {
        let (app, _) = app(&heart_rate_points());

        let cases = [
            "/data?user_id=p1&start_date=2025-06-01&end_date=2025-06-02",
            "/data?user_id=p1&metric=blood_oxygen&start_date=2025-06-01&end_date=2025-06-02",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-02&end_date=2025-06-01",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-02&limit=0",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-02&offset=-1",
            "/data?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-02&resolution=5m",
            "/data/imputed?user_id=p1&metric=heart_rate&start_date=2025-06-01&end_date=2025-06-02&resolution=1h",
        ];
        for uri in cases {
            let (status, body) = send(&app, "GET", uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{}", uri);
            assert!(!body["error"]["message"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_forward_fill_visible_in_imputed_view() {
        let points: Vec<RawPoint> = [0, 1, 2, 5, 6]
            .iter()
            .map(|m| RawPoint::numeric(T0 + m * 60, "p1", MetricType::Steps, (m * 10) as f64))
            .collect();
        let (app, _) = app(&points);

        let (status, body) = send(
            &app,
            "POST",
            "/data/run_imputation?user_id=p1&metric=steps&start_date=2025-06-01T12:00:00Z&end_date=2025-06-01T12:06:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["strategy"], "ffill");
        assert_eq!(body["step_secs"], 60);
        assert_eq!(body["imputed_points"], 2);

        let (status, body) = send(
            &app,
            "GET",
            "/data/imputed?user_id=p1&metric=steps&start_date=2025-06-01T12:00:00Z&end_date=2025-06-01T12:06:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 7);

        let imputed: Vec<(String, f64)> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|row| row["is_imputed"] == true)
            .map(|row| {
                (
                    row["timestamp"].as_str().unwrap().to_string(),
                    row["value_numeric"].as_f64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            imputed,
            vec![
                (format_timestamp(T0 + 180), 20.0),
                (format_timestamp(T0 + 240), 20.0),
            ]
        );

        // The observed view never shows imputed rows
        let (_, observed) = send(
            &app,
            "GET",
            "/data?user_id=p1&metric=steps&start_date=2025-06-01T12:00:00Z&end_date=2025-06-01T12:06:00Z",
        )
        .await;
        assert_eq!(observed["total_count"], 5);
    }

    #[tokio::test]
    async fn test_run_imputation_defaults_to_observed_extent() {
        let points = vec![
            RawPoint::numeric(T0, "p1", MetricType::Calories, 5.0),
            RawPoint::numeric(T0 + 180, "p1", MetricType::Calories, 7.0),
        ];
        let (app, _) = app(&points);

        let (status, body) = send(&app, "POST", "/data/run_imputation?user_id=p1&metric=calories").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start"], T0);
        assert_eq!(body["end"], T0 + 180);
        assert_eq!(body["imputed_points"], 2);
    }

    #[tokio::test]
    async fn test_insufficient_data_is_422_and_writes_nothing() {
        let points: Vec<RawPoint> = (0..5)
            .map(|m| RawPoint::numeric(T0 + m * 60, "p1", MetricType::HeartRate, 70.0))
            .collect();
        let (app, store) = app(&points);

        let (status, body) = send(
            &app,
            "POST",
            "/data/run_imputation?user_id=p1&metric=heart_rate&start_date=2025-06-01T12:00:00Z&end_date=2025-06-01T13:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "IMPUTATION_ERROR");

        let imputed = store
            .read_imputed(&SeriesKey {
                participant_id: "p1",
                metric_type: MetricType::HeartRate,
                start: T0,
                end: T0 + 3_600,
            })
            .unwrap();
        assert!(imputed.is_empty());
    }

    #[tokio::test]
    async fn test_run_imputation_requires_known_metric() {
        let (app, _) = app(&[]);
        let (status, body) = send(&app, "POST", "/data/run_imputation?user_id=p1&metric=spo2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
