//! Row types for the raw / rollup / imputed data model

use crate::metrics::MetricType;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Observed point. Unique per (timestamp, participant_id, metric_type).
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub timestamp: i64,
    pub participant_id: String,
    pub metric_type: MetricType,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
}

impl RawPoint {
    pub fn numeric(timestamp: i64, participant_id: &str, metric_type: MetricType, value: f64) -> Self {
        Self {
            timestamp,
            participant_id: participant_id.to_string(),
            metric_type,
            value_numeric: Some(value),
            value_text: None,
        }
    }
}

/// Synthesised point for a gap timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedPoint {
    pub timestamp: i64,
    pub participant_id: String,
    pub metric_type: MetricType,
    pub value_numeric: f64,
}

/// Precomputed aggregate bucket
#[derive(Debug, Clone, PartialEq)]
pub struct RollupRow {
    pub bucket_start: i64,
    pub resolution: RollupResolution,
    pub participant_id: String,
    pub metric_type: MetricType,
    pub avg: Option<f64>,
    pub sum: Option<f64>,
    pub count: i64,
}

/// Rollup bucket widths kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RollupResolution {
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl RollupResolution {
    /// Finest first
    pub const ALL: [RollupResolution; 3] = [
        RollupResolution::Minute,
        RollupResolution::Hour,
        RollupResolution::Day,
    ];

    pub fn seconds(&self) -> i64 {
        match self {
            RollupResolution::Minute => 60,
            RollupResolution::Hour => 3_600,
            RollupResolution::Day => 86_400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RollupResolution::Minute => "1m",
            RollupResolution::Hour => "1h",
            RollupResolution::Day => "1d",
        }
    }

    /// Start of the bucket containing `ts`
    pub fn bucket_start(&self, ts: i64) -> i64 {
        ts.div_euclid(self.seconds()) * self.seconds()
    }
}

impl fmt::Display for RollupResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RollupResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(RollupResolution::Minute),
            "1h" => Ok(RollupResolution::Hour),
            "1d" => Ok(RollupResolution::Day),
            other => Err(format!("unknown rollup resolution: {}", other)),
        }
    }
}

/// One row returned to a query caller, whatever table it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub timestamp: i64,
    pub participant_id: String,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub is_imputed: bool,
}

/// Inclusive timestamp range for a (participant, metric) read
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesKey<'a> {
    pub participant_id: &'a str,
    pub metric_type: MetricType,
    pub start: i64,
    pub end: i64,
}

/// Persisted delta-load watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestCursor {
    pub last_success_timestamp: i64,
}
