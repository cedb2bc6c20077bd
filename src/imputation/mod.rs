//! Gap filling for per-participant series
//!
//! One run over `(participant, metric, [start, end])`:
//! 1. Lay the metric's sampling grid over the range (origin aligned down to the step)
//! 2. Average raw points per slot; empty slots are gaps
//! 3. Fill with the metric class's strategy (ffill/bfill or ARIMA(p,1,0))
//! 4. Replace the imputed rows in `[start, end]` with one point per gap slot
//!
//! The grid step is the configured detail level of the metric's resource (floored
//! at the metric's own step), widened to the stored data's spacing when that is
//! coarser. Step 4 only happens after step 3 succeeded, so a failed run leaves prior
//! imputed rows as they were. Runs on the same pair are serialized; store access and
//! model fitting run on the blocking pool, fitting under a timeout.

pub mod ar_model;
pub mod grid;
pub mod locks;
pub mod strategy;

use crate::error::{CoreError, ImputationError, StorageError};
use crate::metrics::{MetricCatalog, MetricType};
use crate::store::{ImputedPoint, SeriesKey, TimeSeriesStore};
use grid::Grid;
use locks::PairLocks;
use serde::Serialize;
use std::time::Duration;
use strategy::FillStrategy;

#[derive(Debug, Clone)]
pub struct ImputationSettings {
    pub min_samples: usize,
    pub ar_order: usize,
    pub timeout_ms: u64,
    pub max_grid_points: usize,
}

impl Default for ImputationSettings {
    fn default() -> Self {
        Self {
            min_samples: 12,
            ar_order: 5,
            timeout_ms: 10_000,
            max_grid_points: 200_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputationSummary {
    pub participant_id: String,
    pub metric: String,
    pub start: i64,
    pub end: i64,
    pub strategy: &'static str,
    pub step_secs: i64,
    pub observed_slots: usize,
    pub imputed_points: usize,
}

pub struct ImputationEngine {
    store: TimeSeriesStore,
    catalog: MetricCatalog,
    settings: ImputationSettings,
    locks: PairLocks,
}

impl ImputationEngine {
    pub fn new(store: TimeSeriesStore, catalog: MetricCatalog, settings: ImputationSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
            locks: PairLocks::new(),
        }
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Configured sampling interval for a metric, never finer than its own step
    pub fn base_step_secs(&self, metric: MetricType) -> i64 {
        self.catalog
            .raw_interval_secs(metric)
            .max(metric.descriptor().imputation_step_secs)
    }

    /// First and last observed timestamp for a pair
    pub async fn observed_extent(
        &self,
        participant_id: &str,
        metric: MetricType,
    ) -> Result<Option<(i64, i64)>, CoreError> {
        let participant_id = participant_id.to_string();
        self.with_store(move |store| store.raw_extent(&participant_id, metric))
            .await
    }

    pub async fn run(
        &self,
        participant_id: &str,
        metric: MetricType,
        start: i64,
        end: i64,
    ) -> Result<ImputationSummary, CoreError> {
        if participant_id.trim().is_empty() {
            return Err(CoreError::validation("user_id is required"));
        }
        if start > end {
            return Err(CoreError::validation(format!(
                "start ({}) is after end ({})",
                start, end
            )));
        }

        let descriptor = metric.descriptor();
        let base_step = self.base_step_secs(metric);
        let finest = Grid::covering(start, end, base_step);
        if finest.len > self.settings.max_grid_points {
            return Err(CoreError::validation(format!(
                "range spans {} grid slots, limit is {}",
                finest.len, self.settings.max_grid_points
            )));
        }

        let strategy = FillStrategy::for_class(
            descriptor.imputation,
            self.settings.ar_order,
            self.settings.min_samples,
        );

        let _pair = self.locks.acquire(participant_id, metric).await;

        let min_samples = self.settings.min_samples;
        let owned_participant = participant_id.to_string();
        let (grid, observations) = self
            .with_store(move |store| {
                let in_range = store.read_numeric_series(&SeriesKey {
                    participant_id: &owned_participant,
                    metric_type: metric,
                    start,
                    end,
                })?;
                let step = grid::observed_step(base_step, &in_range, min_samples);
                let grid = Grid::covering(start, end, step);
                // Slot 0 may start before `start`
                let observations = store.read_numeric_series(&SeriesKey {
                    participant_id: &owned_participant,
                    metric_type: metric,
                    start: grid.origin,
                    end: grid.span_end(),
                })?;
                Ok((grid, observations))
            })
            .await?;

        if grid.step != base_step {
            log::debug!(
                "🧩 {}/{}: stored spacing is {}s, widening grid from {}s",
                participant_id,
                metric,
                grid.step,
                base_step
            );
        }

        let slots = grid.bucket(&observations);
        let observed_slots = slots.iter().filter(|s| s.is_some()).count();

        let mut summary = ImputationSummary {
            participant_id: participant_id.to_string(),
            metric: metric.as_str().to_string(),
            start,
            end,
            strategy: strategy.name(),
            step_secs: grid.step,
            observed_slots,
            imputed_points: 0,
        };

        if observed_slots == 0 {
            self.replace(participant_id, metric, start, end, Vec::new()).await?;
            log::info!("🧩 {}/{}: no observations in range, nothing imputed", participant_id, metric);
            return Ok(summary);
        }

        strategy.check_samples(observed_slots)?;

        let filled = if strategy.is_expensive() {
            self.fill_blocking(strategy, slots.clone()).await?
        } else {
            strategy.fill(&slots)?
        };

        let points: Vec<ImputedPoint> = slots
            .iter()
            .zip(&filled)
            .enumerate()
            .filter(|(_, (slot, _))| slot.is_none())
            .map(|(i, (_, value))| (grid.timestamp(i), *value))
            .filter(|(ts, _)| *ts >= start && *ts <= end)
            .map(|(timestamp, value_numeric)| ImputedPoint {
                timestamp,
                participant_id: participant_id.to_string(),
                metric_type: metric,
                value_numeric,
            })
            .collect();

        summary.imputed_points = self.replace(participant_id, metric, start, end, points).await?;

        log::info!(
            "🧩 {}/{} [{}, {}] via {} at {}s: {} observed slots, {} imputed points",
            participant_id,
            metric,
            start,
            end,
            summary.strategy,
            summary.step_secs,
            observed_slots,
            summary.imputed_points
        );

        Ok(summary)
    }

    async fn replace(
        &self,
        participant_id: &str,
        metric: MetricType,
        start: i64,
        end: i64,
        points: Vec<ImputedPoint>,
    ) -> Result<usize, CoreError> {
        let participant_id = participant_id.to_string();
        self.with_store(move |store| {
            store.replace_imputed(
                &SeriesKey {
                    participant_id: &participant_id,
                    metric_type: metric,
                    start,
                    end,
                },
                &points,
            )
        })
        .await
    }

    /// Run a store call on the blocking pool
    async fn with_store<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(TimeSeriesStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StorageError::Interrupted(e.to_string()))?;
        Ok(result?)
    }

    async fn fill_blocking(
        &self,
        strategy: FillStrategy,
        slots: Vec<Option<f64>>,
    ) -> Result<Vec<f64>, ImputationError> {
        let timeout_ms = self.settings.timeout_ms;
        let task = tokio::task::spawn_blocking(move || strategy.fill(&slots));

        match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ImputationError::Aborted(join_err.to_string())),
            Err(_) => {
                log::error!("⏱️  Model fitting exceeded {}ms", timeout_ms);
                Err(ImputationError::Timeout { after_ms: timeout_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::metrics::{DetailLevel, Resource};
    use crate::store::RawPoint;
    use crate::synthetic::SyntheticGenerator;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn engine_with(points: &[RawPoint]) -> ImputationEngine {
        engine_configured(points, MetricCatalog::with_defaults(), ImputationSettings::default())
    }

    fn engine_configured(
        points: &[RawPoint],
        catalog: MetricCatalog,
        settings: ImputationSettings,
    ) -> ImputationEngine {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        store.upsert_raw(points).unwrap();
        ImputationEngine::new(store, catalog, settings)
    }

    fn catalog_at(resource: Resource, detail: DetailLevel) -> MetricCatalog {
        let overrides = HashMap::from([(resource, detail)]);
        MetricCatalog::resolve(&MetricType::ALL, &overrides).unwrap()
    }

    fn key(metric: MetricType, start: i64, end: i64) -> SeriesKey<'static> {
        SeriesKey {
            participant_id: "p1",
            metric_type: metric,
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_sparse_forward_fill_gap() {
        let points: Vec<RawPoint> = [0, 1, 2, 5, 6]
            .iter()
            .map(|m| RawPoint::numeric(m * 60, "p1", MetricType::Steps, (m * 10) as f64))
            .collect();
        let engine = engine_with(&points);

        let summary = engine.run("p1", MetricType::Steps, 0, 360).await.unwrap();
        assert_eq!(summary.imputed_points, 2);
        assert_eq!(summary.strategy, "ffill");

        let imputed = engine.store().read_imputed(&key(MetricType::Steps, 0, 360)).unwrap();
        let got: Vec<(i64, f64)> = imputed.iter().map(|p| (p.timestamp, p.value_numeric)).collect();
        assert_eq!(got, vec![(180, 20.0), (240, 20.0)]);
    }

    #[tokio::test]
    async fn test_rerun_replaces_not_merges() {
        let points = vec![
            RawPoint::numeric(0, "p1", MetricType::Steps, 1.0),
            RawPoint::numeric(240, "p1", MetricType::Steps, 2.0),
        ];
        let engine = engine_with(&points);

        engine.run("p1", MetricType::Steps, 0, 240).await.unwrap();
        engine.run("p1", MetricType::Steps, 0, 240).await.unwrap();

        let imputed = engine.store().read_imputed(&key(MetricType::Steps, 0, 240)).unwrap();
        assert_eq!(imputed.len(), 3);
    }

    #[tokio::test]
    async fn test_dense_insufficient_data_writes_nothing() {
        let points: Vec<RawPoint> = (0..5)
            .map(|i| RawPoint::numeric(i * 60, "p1", MetricType::HeartRate, 70.0))
            .collect();
        let engine = engine_with(&points);
        let prior = ImputedPoint {
            timestamp: 600,
            participant_id: "p1".to_string(),
            metric_type: MetricType::HeartRate,
            value_numeric: 1.0,
        };
        engine
            .store()
            .replace_imputed(&key(MetricType::HeartRate, 0, 3_600), &[prior.clone()])
            .unwrap();

        let err = engine.run("p1", MetricType::HeartRate, 0, 3_600).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Imputation);
        assert!(matches!(
            err,
            CoreError::Imputation(ImputationError::InsufficientData { observed: 5, required: 12 })
        ));

        let imputed = engine.store().read_imputed(&key(MetricType::HeartRate, 0, 3_600)).unwrap();
        assert_eq!(imputed, vec![prior]);
    }

    #[tokio::test]
    async fn test_dense_gap_filled_by_model() {
        let points: Vec<RawPoint> = (0..40)
            .filter(|m| !(20..23).contains(m))
            .map(|m| RawPoint::numeric(m * 60, "p1", MetricType::HeartRate, 60.0 + m as f64))
            .collect();
        let engine = engine_with(&points);

        let summary = engine.run("p1", MetricType::HeartRate, 0, 39 * 60).await.unwrap();
        assert_eq!(summary.strategy, "arima");
        assert_eq!(summary.imputed_points, 3);

        let imputed = engine
            .store()
            .read_imputed(&key(MetricType::HeartRate, 0, 39 * 60))
            .unwrap();
        for point in imputed {
            let expected = 60.0 + (point.timestamp / 60) as f64;
            assert!((point.value_numeric - expected).abs() < 0.5);
        }
    }

    #[tokio::test]
    async fn test_empty_range_is_not_an_error() {
        let engine = engine_with(&[]);
        let summary = engine.run("p1", MetricType::HeartRate, 0, 3_600).await.unwrap();
        assert_eq!(summary.imputed_points, 0);
        assert_eq!(summary.observed_slots, 0);
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let engine = engine_with(&[]);
        let err = engine.run("p1", MetricType::Steps, 10, 0).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);

        let err = engine
            .run("p1", MetricType::HeartRate, 0, 86_400 * 365)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_sparse_grid_follows_configured_detail() {
        // Steps ingested at 15 minute detail, no missing intervals
        let points: Vec<RawPoint> = (0..4)
            .map(|i| RawPoint::numeric(i * 900, "p1", MetricType::Steps, 100.0))
            .collect();
        let engine = engine_configured(
            &points,
            catalog_at(Resource::Steps, DetailLevel::FifteenMinutes),
            ImputationSettings::default(),
        );

        let summary = engine.run("p1", MetricType::Steps, 0, 2_700).await.unwrap();
        assert_eq!(summary.step_secs, 900);
        assert_eq!(summary.observed_slots, 4);
        assert_eq!(summary.imputed_points, 0);

        // One missing interval is one imputed point
        let mut gappy = points.clone();
        gappy.remove(2);
        let engine = engine_configured(
            &gappy,
            catalog_at(Resource::Steps, DetailLevel::FifteenMinutes),
            ImputationSettings::default(),
        );
        let summary = engine.run("p1", MetricType::Steps, 0, 2_700).await.unwrap();
        assert_eq!(summary.imputed_points, 1);
        let imputed = engine.store().read_imputed(&key(MetricType::Steps, 0, 2_700)).unwrap();
        assert_eq!(imputed.len(), 1);
        assert_eq!(imputed[0].timestamp, 1_800);
    }

    #[tokio::test]
    async fn test_dense_fit_on_fifteen_minute_heart_rate() {
        let points: Vec<RawPoint> = (0..96)
            .filter(|i| !(40..44).contains(i))
            .map(|i| RawPoint::numeric(i * 900, "p1", MetricType::HeartRate, 70.0 + (i % 7) as f64))
            .collect();
        assert_eq!(points.len(), 92);
        let engine = engine_with(&points);

        let summary = engine.run("p1", MetricType::HeartRate, 0, 95 * 900).await.unwrap();
        assert_eq!(summary.strategy, "arima");
        assert_eq!(summary.step_secs, 900);
        assert_eq!(summary.imputed_points, 4);

        let imputed = engine
            .store()
            .read_imputed(&key(MetricType::HeartRate, 0, 95 * 900))
            .unwrap();
        let stamps: Vec<i64> = imputed.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![36_000, 36_900, 37_800, 38_700]);
        assert!(imputed.iter().all(|p| p.value_numeric.is_finite()));
    }

    #[tokio::test]
    async fn test_dense_fit_on_hourly_synthetic_data() {
        let first = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        let mut heart: Vec<RawPoint> = SyntheticGenerator::with_seed(3)
            .generate("p1", first, last)
            .into_iter()
            .filter(|p| p.metric_type == MetricType::HeartRate)
            .collect();
        assert_eq!(heart.len(), 7 * 24);
        // Drop three consecutive hours on day three
        heart.drain(50..53);

        let engine = engine_with(&heart);
        let (start, end) = engine
            .observed_extent("p1", MetricType::HeartRate)
            .await
            .unwrap()
            .unwrap();

        let summary = engine.run("p1", MetricType::HeartRate, start, end).await.unwrap();
        assert_eq!(summary.step_secs, 3_600);
        assert_eq!(summary.observed_slots, 165);
        assert_eq!(summary.imputed_points, 3);

        let imputed = engine
            .store()
            .read_imputed(&key(MetricType::HeartRate, start, end))
            .unwrap();
        let day_start = 1_748_736_000;
        let stamps: Vec<i64> = imputed.iter().map(|p| p.timestamp).collect();
        assert_eq!(
            stamps,
            vec![day_start + 50 * 3_600, day_start + 51 * 3_600, day_start + 52 * 3_600]
        );
    }

    #[tokio::test]
    async fn test_fit_timeout_keeps_prior_rows() {
        // Large enough that fitting cannot finish inside the first poll
        let n: i64 = 150_000;
        let points: Vec<RawPoint> = (0..n)
            .filter(|m| m % 1_000 != 500)
            .map(|m| RawPoint::numeric(m * 60, "p1", MetricType::HeartRate, 60.0 + (m % 13) as f64))
            .collect();
        let settings = ImputationSettings {
            timeout_ms: 0,
            ..ImputationSettings::default()
        };
        let engine = engine_configured(&points, MetricCatalog::with_defaults(), settings);

        let end = (n - 1) * 60;
        let prior = ImputedPoint {
            timestamp: 500 * 60,
            participant_id: "p1".to_string(),
            metric_type: MetricType::HeartRate,
            value_numeric: 1.0,
        };
        engine
            .store()
            .replace_imputed(&key(MetricType::HeartRate, 0, end), &[prior.clone()])
            .unwrap();

        let err = engine.run("p1", MetricType::HeartRate, 0, end).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Imputation(ImputationError::Timeout { after_ms: 0 })
        ));

        let imputed = engine.store().read_imputed(&key(MetricType::HeartRate, 0, end)).unwrap();
        assert_eq!(imputed, vec![prior]);
    }
}
