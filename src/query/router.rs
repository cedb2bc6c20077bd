//! Query routing
//!
//! ## Resolution selection
//!
//! Candidates are raw (spaced at the metric's ingest interval) and the 1m / 1h / 1d
//! rollups. Rollups finer than the raw interval are never candidates. The router
//! serves the finest candidate `r` with `ceil(span / r) <= budget`, and 1d when
//! nothing fits. A caller hint pins the resolution instead.
//!
//! The imputed view is only served at raw resolution, where gap timestamps exist.
//!
//! ## Pagination
//!
//! Rows are ordered by `(timestamp, participant_id)`; `offset`/`limit` apply after
//! ordering and `total_count` counts the full matching set. A page and its count
//! come from the same store snapshot.

use crate::error::CoreError;
use crate::metrics::{MetricCatalog, MetricType};
use crate::store::{RollupResolution, SeriesKey, SeriesRow, TimeSeriesStore};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_POINT_BUDGET: i64 = 1_440;
pub const MAX_PAGE_LIMIT: i64 = 10_000;

/// Physical source a page was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Raw,
    Rollup(RollupResolution),
}

impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Raw => "raw",
            Resolution::Rollup(r) => r.as_str(),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Resolution::Raw),
            other => other
                .parse::<RollupResolution>()
                .map(Resolution::Rollup)
                .map_err(|_| format!("unknown resolution: {} (expected raw, 1m, 1h or 1d)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Raw or rollup rows only
    Observed,
    /// Raw rows merged with imputed rows
    Imputed,
}

/// Unvalidated query parameters
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub participant_id: String,
    pub metric: String,
    pub start: i64,
    pub end: i64,
    pub limit: i64,
    pub offset: i64,
    pub resolution: Option<String>,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage {
    pub rows: Vec<SeriesRow>,
    pub total_count: i64,
    pub resolution: Resolution,
}

/// Finest resolution keeping `ceil(span / r)` within `budget`
pub fn select_resolution(span_secs: i64, raw_interval_secs: i64, budget: i64) -> Resolution {
    let mut candidates: Vec<(Resolution, i64)> = vec![(Resolution::Raw, raw_interval_secs.max(1))];
    for rollup in RollupResolution::ALL {
        if rollup.seconds() >= raw_interval_secs {
            candidates.push((Resolution::Rollup(rollup), rollup.seconds()));
        }
    }
    // Stable: raw wins a tie with an equally wide rollup
    candidates.sort_by_key(|(_, width)| *width);

    let span = span_secs.max(0);
    for (resolution, width) in &candidates {
        let points = (span + width - 1) / width;
        if points <= budget {
            return *resolution;
        }
    }

    Resolution::Rollup(RollupResolution::Day)
}

#[derive(Clone)]
pub struct QueryRouter {
    store: TimeSeriesStore,
    catalog: MetricCatalog,
    point_budget: i64,
}

struct ValidatedQuery {
    metric: MetricType,
    pinned: Option<Resolution>,
}

impl QueryRouter {
    pub fn new(store: TimeSeriesStore, catalog: MetricCatalog, point_budget: i64) -> Self {
        Self {
            store,
            catalog,
            point_budget: point_budget.max(1),
        }
    }

    pub fn point_budget(&self) -> i64 {
        self.point_budget
    }

    /// Validate, route and read one page
    pub fn query(&self, request: &QueryRequest) -> Result<QueryPage, CoreError> {
        let validated = validate(request)?;

        let resolution = match (request.mode, validated.pinned) {
            (QueryMode::Imputed, None) | (QueryMode::Imputed, Some(Resolution::Raw)) => Resolution::Raw,
            (QueryMode::Imputed, Some(other)) => {
                return Err(CoreError::validation(format!(
                    "imputed data is served at raw resolution only, got resolution={}",
                    other
                )));
            }
            (QueryMode::Observed, Some(pinned)) => pinned,
            (QueryMode::Observed, None) => select_resolution(
                request.end - request.start,
                self.catalog.raw_interval_secs(validated.metric),
                self.point_budget,
            ),
        };

        let key = SeriesKey {
            participant_id: &request.participant_id,
            metric_type: validated.metric,
            start: request.start,
            end: request.end,
        };

        let (rows, total_count) = match (request.mode, resolution) {
            (QueryMode::Imputed, _) => {
                self.store
                    .read_with_imputed_window(&key, request.limit, request.offset)?
            }
            (QueryMode::Observed, Resolution::Raw) => {
                self.store.read_raw_window(&key, request.limit, request.offset)?
            }
            (QueryMode::Observed, Resolution::Rollup(rollup)) => self.store.read_rollup_window(
                rollup,
                validated.metric.descriptor().rollup_value,
                &key,
                request.limit,
                request.offset,
            )?,
        };

        log::debug!(
            "🔎 {}/{} [{}, {}] via {}: {} of {} rows",
            request.participant_id,
            validated.metric,
            request.start,
            request.end,
            resolution,
            rows.len(),
            total_count
        );

        Ok(QueryPage {
            rows,
            total_count,
            resolution,
        })
    }
}

fn validate(request: &QueryRequest) -> Result<ValidatedQuery, CoreError> {
    if request.participant_id.trim().is_empty() {
        return Err(CoreError::validation("user_id is required"));
    }
    let metric = request
        .metric
        .parse::<MetricType>()
        .map_err(CoreError::Validation)?;
    if request.start > request.end {
        return Err(CoreError::validation(format!(
            "start ({}) is after end ({})",
            request.start, request.end
        )));
    }
    if request.limit <= 0 {
        return Err(CoreError::validation("limit must be positive"));
    }
    if request.limit > MAX_PAGE_LIMIT {
        return Err(CoreError::validation(format!(
            "limit must not exceed {}",
            MAX_PAGE_LIMIT
        )));
    }
    if request.offset < 0 {
        return Err(CoreError::validation("offset must not be negative"));
    }
    let pinned = match &request.resolution {
        Some(hint) => Some(hint.parse::<Resolution>().map_err(CoreError::Validation)?),
        None => None,
    };

    Ok(ValidatedQuery { metric, pinned })
}
