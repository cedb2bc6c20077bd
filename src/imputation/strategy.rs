//! Gap-filling strategies, one per imputation class

use super::ar_model;
use crate::error::ImputationError;
use crate::metrics::ImputationClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    /// Last observation carried forward, first observation carried back
    ForwardFill,
    /// ARIMA(p,1,0) forecasts
    Autoregressive { max_order: usize, min_samples: usize },
}

impl FillStrategy {
    pub fn for_class(class: ImputationClass, max_order: usize, min_samples: usize) -> Self {
        match class {
            ImputationClass::Sparse => FillStrategy::ForwardFill,
            ImputationClass::Dense => FillStrategy::Autoregressive {
                max_order,
                min_samples,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FillStrategy::ForwardFill => "ffill",
            FillStrategy::Autoregressive { .. } => "arima",
        }
    }

    /// Whether this strategy should run off the async executor
    pub fn is_expensive(&self) -> bool {
        matches!(self, FillStrategy::Autoregressive { .. })
    }

    /// Check the observed slot count before any work is scheduled
    pub fn check_samples(&self, observed: usize) -> Result<(), ImputationError> {
        match self {
            FillStrategy::Autoregressive { min_samples, .. } if observed < *min_samples => {
                Err(ImputationError::InsufficientData {
                    observed,
                    required: *min_samples,
                })
            }
            _ => Ok(()),
        }
    }

    /// Value for every slot; observed slots keep their value
    pub fn fill(&self, slots: &[Option<f64>]) -> Result<Vec<f64>, ImputationError> {
        let observed = slots.iter().filter(|s| s.is_some()).count();
        self.check_samples(observed)?;

        match self {
            FillStrategy::ForwardFill => forward_fill(slots),
            FillStrategy::Autoregressive { max_order, .. } => ar_model::impute(slots, *max_order),
        }
    }
}

fn forward_fill(slots: &[Option<f64>]) -> Result<Vec<f64>, ImputationError> {
    let first = slots
        .iter()
        .find_map(|s| *s)
        .ok_or(ImputationError::InsufficientData {
            observed: 0,
            required: 1,
        })?;

    let mut last = first;
    Ok(slots
        .iter()
        .map(|slot| {
            if let Some(v) = slot {
                last = *v;
            }
            last
        })
        .collect())
}
