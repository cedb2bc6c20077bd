//! Static metric catalog
//!
//! Every metric the system stores is listed here once, with the vendor resource it
//! comes from, how it is gap-filled, and which rollup value represents it. Ingestion,
//! query routing and imputation all dispatch on this table instead of comparing
//! metric names.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Stored metric type (the `metric_type` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    HeartRate,
    Steps,
    Calories,
    SleepTotalMinutes,
    SleepDeepMinutes,
    SleepLightMinutes,
    SleepRemMinutes,
    SleepWakeMinutes,
}

/// Gap-filling strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputationClass {
    /// Frequently sampled physiological signal: model-based estimate
    Dense,
    /// Accumulated count: forward fill, backward fill for leading gaps
    Sparse,
}

/// Which rollup column represents the metric at coarse resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupValue {
    Avg,
    Sum,
}

/// Vendor resource a metric is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Heart,
    Steps,
    Calories,
    Sleep,
}

/// Vendor sampling granularity for intraday resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetailLevel {
    OneSecond,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    pub metric: MetricType,
    pub name: &'static str,
    pub resource: Resource,
    pub imputation: ImputationClass,
    pub rollup_value: RollupValue,
    /// Grid step used when filling gaps
    pub imputation_step_secs: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub resource: Resource,
    pub name: &'static str,
    /// Accepted detail levels, finest first. Empty for daily-log resources.
    pub detail_levels: &'static [DetailLevel],
    pub default_detail: Option<DetailLevel>,
}

const DAY_SECS: i64 = 86_400;

const METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        metric: MetricType::HeartRate,
        name: "heart_rate",
        resource: Resource::Heart,
        imputation: ImputationClass::Dense,
        rollup_value: RollupValue::Avg,
        imputation_step_secs: 60,
    },
    MetricDescriptor {
        metric: MetricType::Steps,
        name: "steps",
        resource: Resource::Steps,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: 60,
    },
    MetricDescriptor {
        metric: MetricType::Calories,
        name: "calories",
        resource: Resource::Calories,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: 60,
    },
    MetricDescriptor {
        metric: MetricType::SleepTotalMinutes,
        name: "sleep_total_minutes",
        resource: Resource::Sleep,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: DAY_SECS,
    },
    MetricDescriptor {
        metric: MetricType::SleepDeepMinutes,
        name: "sleep_deep_minutes",
        resource: Resource::Sleep,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: DAY_SECS,
    },
    MetricDescriptor {
        metric: MetricType::SleepLightMinutes,
        name: "sleep_light_minutes",
        resource: Resource::Sleep,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: DAY_SECS,
    },
    MetricDescriptor {
        metric: MetricType::SleepRemMinutes,
        name: "sleep_rem_minutes",
        resource: Resource::Sleep,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: DAY_SECS,
    },
    MetricDescriptor {
        metric: MetricType::SleepWakeMinutes,
        name: "sleep_wake_minutes",
        resource: Resource::Sleep,
        imputation: ImputationClass::Sparse,
        rollup_value: RollupValue::Sum,
        imputation_step_secs: DAY_SECS,
    },
];

const RESOURCES: &[ResourceDescriptor] = &[
    ResourceDescriptor {
        resource: Resource::Heart,
        name: "heart",
        detail_levels: &[
            DetailLevel::OneSecond,
            DetailLevel::OneMinute,
            DetailLevel::FiveMinutes,
            DetailLevel::FifteenMinutes,
        ],
        default_detail: Some(DetailLevel::OneSecond),
    },
    ResourceDescriptor {
        resource: Resource::Steps,
        name: "steps",
        detail_levels: &[
            DetailLevel::OneMinute,
            DetailLevel::FiveMinutes,
            DetailLevel::FifteenMinutes,
        ],
        default_detail: Some(DetailLevel::OneMinute),
    },
    ResourceDescriptor {
        resource: Resource::Calories,
        name: "calories",
        detail_levels: &[
            DetailLevel::OneMinute,
            DetailLevel::FiveMinutes,
            DetailLevel::FifteenMinutes,
        ],
        default_detail: Some(DetailLevel::OneMinute),
    },
    ResourceDescriptor {
        resource: Resource::Sleep,
        name: "sleep",
        detail_levels: &[],
        default_detail: None,
    },
];

impl MetricType {
    pub const ALL: [MetricType; 8] = [
        MetricType::HeartRate,
        MetricType::Steps,
        MetricType::Calories,
        MetricType::SleepTotalMinutes,
        MetricType::SleepDeepMinutes,
        MetricType::SleepLightMinutes,
        MetricType::SleepRemMinutes,
        MetricType::SleepWakeMinutes,
    ];

    pub fn descriptor(&self) -> &'static MetricDescriptor {
        // METRICS is ordered like the enum
        &METRICS[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.descriptor().name
    }

    /// Sleep stage metric for a `levels.summary` key (`deep`, `light`, `rem`, `wake`)
    pub fn sleep_stage(stage: &str) -> Option<MetricType> {
        match stage {
            "deep" => Some(MetricType::SleepDeepMinutes),
            "light" => Some(MetricType::SleepLightMinutes),
            "rem" => Some(MetricType::SleepRemMinutes),
            "wake" => Some(MetricType::SleepWakeMinutes),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        METRICS
            .iter()
            .find(|d| d.name == s)
            .map(|d| d.metric)
            .ok_or_else(|| format!("unknown metric type: {}", s))
    }
}

impl Resource {
    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        &RESOURCES[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.descriptor().name
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricType> + '_ {
        METRICS
            .iter()
            .filter(move |d| d.resource == *self)
            .map(|d| d.metric)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::OneSecond => "1sec",
            DetailLevel::OneMinute => "1min",
            DetailLevel::FiveMinutes => "5min",
            DetailLevel::FifteenMinutes => "15min",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            DetailLevel::OneSecond => 1,
            DetailLevel::OneMinute => 60,
            DetailLevel::FiveMinutes => 300,
            DetailLevel::FifteenMinutes => 900,
        }
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1sec" => Ok(DetailLevel::OneSecond),
            "1min" => Ok(DetailLevel::OneMinute),
            "5min" => Ok(DetailLevel::FiveMinutes),
            "15min" => Ok(DetailLevel::FifteenMinutes),
            other => Err(format!("unknown detail level: {}", other)),
        }
    }
}

/// Per-resource fetch plan resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub resource: Resource,
    pub detail: Option<DetailLevel>,
}

/// Catalog resolved against deployment configuration
///
/// Holds the detail level chosen for each ingested resource; those levels are
/// validated against the vendor's accepted set here, so an unsupported level is a
/// startup error instead of a 400 at run time.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    plans: Vec<FetchPlan>,
    details: HashMap<Resource, Option<DetailLevel>>,
}

impl MetricCatalog {
    /// Resolve the resources behind `metrics`, applying detail overrides
    pub fn resolve(
        metrics: &[MetricType],
        detail_overrides: &HashMap<Resource, DetailLevel>,
    ) -> Result<Self, String> {
        for (resource, level) in detail_overrides {
            let desc = resource.descriptor();
            if !desc.detail_levels.contains(level) {
                return Err(format!(
                    "detail level {} is not accepted for {} (accepted: {})",
                    level.as_str(),
                    desc.name,
                    if desc.detail_levels.is_empty() {
                        "none".to_string()
                    } else {
                        desc.detail_levels
                            .iter()
                            .map(|d| d.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    }
                ));
            }
        }

        Ok(Self::build(metrics, detail_overrides))
    }

    /// Catalog with vendor defaults for every metric
    pub fn with_defaults() -> Self {
        Self::build(&MetricType::ALL, &HashMap::new())
    }

    fn build(metrics: &[MetricType], detail_overrides: &HashMap<Resource, DetailLevel>) -> Self {
        let mut details = HashMap::new();
        for desc in RESOURCES {
            let detail = detail_overrides
                .get(&desc.resource)
                .copied()
                .or(desc.default_detail);
            details.insert(desc.resource, detail);
        }

        let mut resources: Vec<Resource> = metrics.iter().map(|m| m.descriptor().resource).collect();
        resources.sort();
        resources.dedup();

        let plans = resources
            .into_iter()
            .map(|resource| FetchPlan {
                resource,
                detail: details.get(&resource).copied().flatten(),
            })
            .collect();

        Self { plans, details }
    }

    /// Resources fetched by a delta-load run, in stable order
    pub fn fetch_plans(&self) -> &[FetchPlan] {
        &self.plans
    }

    /// Effective spacing of raw points for a metric
    pub fn raw_interval_secs(&self, metric: MetricType) -> i64 {
        let resource = metric.descriptor().resource;
        match self.details.get(&resource).copied().flatten() {
            Some(detail) => detail.seconds(),
            None => DAY_SECS,
        }
    }
}
