//! Delta-load controller
//!
//! One run:
//! 1. Take the run-lock (skip if another run holds it)
//! 2. Window = [cursor (or now - initial lookback), now - safety lag]
//! 3. Fetch every planned resource for every calendar date in the window
//! 4. Keep in-window points for configured metrics, dedup, upsert + advance cursor
//!    in one transaction
//!
//! Any failure before the commit leaves the cursor untouched. Errors never escape
//! `run_once`; they become `RunOutcome::Failed` and the next scheduled run re-covers
//! the same window.

use super::RunLock;
use crate::error::{CoreError, StorageError};
use crate::metrics::{MetricCatalog, MetricType};
use crate::store::{CommitSummary, RawPoint, TimeSeriesStore};
use crate::time::{utc_date, Clock};
use crate::vendor::normalizer::dedup_points;
use crate::vendor::{RetryPolicy, VendorIngestClient};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another run holds the lock
    Skipped,
    Completed {
        window_start: i64,
        window_end: i64,
        rows_written: usize,
        cursor: i64,
    },
    /// Cursor left at its pre-run value
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Distance kept from "now" so the vendor's still-mutable day is not pulled
    pub safety_lag_secs: i64,
    /// Window start when no cursor exists yet
    pub initial_lookback_secs: i64,
    /// Retry policy for the storage commit
    pub storage_retry: RetryPolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            safety_lag_secs: 86_400,
            initial_lookback_secs: 7 * 86_400,
            storage_retry: RetryPolicy::default(),
        }
    }
}

pub struct DeltaLoadController {
    store: TimeSeriesStore,
    client: VendorIngestClient,
    catalog: MetricCatalog,
    metrics: HashSet<MetricType>,
    settings: IngestSettings,
    run_lock: RunLock,
    now_fn: Clock,
}

impl DeltaLoadController {
    pub fn new(
        store: TimeSeriesStore,
        client: VendorIngestClient,
        catalog: MetricCatalog,
        metrics: &[MetricType],
        settings: IngestSettings,
        run_lock: RunLock,
        now_fn: Clock,
    ) -> Self {
        Self {
            store,
            client,
            catalog,
            metrics: metrics.iter().copied().collect(),
            settings,
            run_lock,
            now_fn,
        }
    }

    pub fn state(&self) -> RunState {
        if self.run_lock.is_held() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub async fn run_once(&self) -> RunOutcome {
        let Some(_guard) = self.run_lock.try_acquire() else {
            log::warn!("⏭️  Delta load already running, skipping this trigger");
            return RunOutcome::Skipped;
        };

        match self.run_locked().await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("❌ Delta load failed ({}): {}", e.code().as_str(), e);
                log::error!("   └─ Cursor unchanged, window will be retried next run");
                RunOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_locked(&self) -> Result<RunOutcome, CoreError> {
        let now = (self.now_fn)();
        let cursor = self.store.read_cursor()?;

        let window_start = match cursor {
            Some(c) => c.last_success_timestamp,
            None => now - self.settings.initial_lookback_secs,
        };
        let window_end = now - self.settings.safety_lag_secs;

        log::info!("🚀 Delta load started");
        log::info!("   ├─ Window: [{}, {}]", window_start, window_end);

        if window_start >= window_end {
            log::info!("   └─ Nothing new to fetch");
            return Ok(RunOutcome::Completed {
                window_start,
                window_end,
                rows_written: 0,
                cursor: cursor.map(|c| c.last_success_timestamp).unwrap_or(window_start),
            });
        }

        let first_day = utc_date(window_start)
            .ok_or_else(|| CoreError::validation(format!("window start out of range: {}", window_start)))?;
        let last_day = utc_date(window_end)
            .ok_or_else(|| CoreError::validation(format!("window end out of range: {}", window_end)))?;

        let participant_id = self.client.participant_id().await?;
        log::info!("   ├─ Participant: {}", participant_id);

        let mut batch: Vec<RawPoint> = Vec::new();
        for plan in self.catalog.fetch_plans() {
            let mut kept = 0usize;
            let mut day = first_day;
            while day <= last_day {
                let points = self.client.fetch_day(*plan, day, &participant_id).await?;
                for point in points {
                    if point.timestamp < window_start || point.timestamp > window_end {
                        continue;
                    }
                    if !self.metrics.contains(&point.metric_type) {
                        continue;
                    }
                    batch.push(point);
                    kept += 1;
                }
                day = match day.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
            log::info!("   ├─ {}: {} points in window", plan.resource, kept);
        }

        let batch = dedup_points(batch);
        let summary = self.commit_with_retry(&batch, window_end, now).await?;

        log::info!(
            "✅ Delta load complete: {} rows upserted, {} imputed rows superseded",
            summary.rows_upserted,
            summary.imputed_superseded
        );
        log::info!("   └─ Cursor advanced to {}", summary.cursor);

        Ok(RunOutcome::Completed {
            window_start,
            window_end,
            rows_written: summary.rows_upserted,
            cursor: summary.cursor,
        })
    }

    async fn commit_with_retry(
        &self,
        batch: &[RawPoint],
        window_end: i64,
        now: i64,
    ) -> Result<CommitSummary, StorageError> {
        let mut backoff = self.settings.storage_retry.backoff();
        loop {
            match self.store.commit_ingest_batch(batch, window_end, now) {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    log::warn!("⚠️  Storage commit failed: {}", e);
                    if backoff.sleep().await.is_err() {
                        return Err(e);
                    }
                }
            }
        }
    }
}
