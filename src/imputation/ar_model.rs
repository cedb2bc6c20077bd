//! Autoregressive model on first differences (ARIMA(p,1,0))
//!
//! `Δx[t] = c + φ1·Δx[t-1] + ... + φp·Δx[t-p] + ε`
//!
//! Fitted by least squares with a small ridge term on the lag coefficients. Only
//! rows whose target and lags are all observed differences are used for training.

use crate::error::ImputationError;

const RIDGE: f64 = 1e-6;
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct ArModel {
    pub intercept: f64,
    /// φ1..φp
    pub coefficients: Vec<f64>,
}

impl ArModel {
    pub fn order(&self) -> usize {
        self.coefficients.len()
    }

    /// Next difference given the most recent differences, newest first
    pub fn predict_difference(&self, recent: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(recent.iter().chain(std::iter::repeat(&0.0)))
            .fold(self.intercept, |acc, (phi, d)| acc + phi * d)
    }
}

/// First differences between consecutive observed slots
fn differences(slots: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut diffs = vec![None; slots.len()];
    for t in 1..slots.len() {
        if let (Some(prev), Some(cur)) = (slots[t - 1], slots[t]) {
            diffs[t] = Some(cur - prev);
        }
    }
    diffs
}

/// Design rows `[1, Δ[t-1], ..., Δ[t-p]]` and targets `Δ[t]`
fn training_rows(diffs: &[Option<f64>], order: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::new();
    let mut targets = Vec::new();

    for t in (order + 1)..diffs.len() {
        let Some(target) = diffs[t] else { continue };
        let mut row = Vec::with_capacity(order + 1);
        row.push(1.0);
        for lag in 1..=order {
            match diffs[t - lag] {
                Some(d) => row.push(d),
                None => break,
            }
        }
        if row.len() == order + 1 {
            rows.push(row);
            targets.push(target);
        }
    }

    (rows, targets)
}

/// Fit the highest order `<= max_order` with at least two rows per parameter
pub fn fit(slots: &[Option<f64>], max_order: usize) -> Result<ArModel, ImputationError> {
    let diffs = differences(slots);

    for order in (0..=max_order).rev() {
        let (rows, targets) = training_rows(&diffs, order);
        if rows.len() < 2 * (order + 1) {
            continue;
        }
        let beta = solve_least_squares(&rows, &targets)?;
        if order < max_order {
            log::debug!("AR order reduced from {} to {} ({} training rows)", max_order, order, rows.len());
        }
        return Ok(ArModel {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
        });
    }

    Err(ImputationError::NonConvergence(
        "too few consecutive observations to fit differences".to_string(),
    ))
}

/// Solve `(XᵀX + λI) β = Xᵀy` (intercept unpenalised) by Gaussian elimination
fn solve_least_squares(rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>, ImputationError> {
    let k = rows[0].len();
    let mut a = vec![vec![0.0; k + 1]; k];

    for (row, y) in rows.iter().zip(targets) {
        for i in 0..k {
            for j in 0..k {
                a[i][j] += row[i] * row[j];
            }
            a[i][k] += row[i] * y;
        }
    }

    let scale = (1..k).map(|i| a[i][i]).fold(0.0, f64::max).max(1.0);
    for (i, coeffs) in a.iter_mut().enumerate().skip(1) {
        coeffs[i] += RIDGE * scale;
    }

    for col in 0..k {
        let pivot = (col..k)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ImputationError::NonConvergence(format!(
                "singular normal equations at column {}",
                col
            )));
        }
        a.swap(col, pivot);

        for r in 0..k {
            if r == col {
                continue;
            }
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..=k {
                a[r][c] -= factor * a[col][c];
            }
        }
    }

    let beta: Vec<f64> = (0..k).map(|i| a[i][k] / a[i][i]).collect();
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ImputationError::NonConvergence(
            "non-finite coefficients".to_string(),
        ));
    }
    Ok(beta)
}

/// Fill every gap after the first observation by recursive one-step forecasts
fn forecast_forward(slots: &[Option<f64>], model: &ArModel) -> Vec<Option<f64>> {
    let mut filled = slots.to_vec();
    let Some(first) = filled.iter().position(Option::is_some) else {
        return filled;
    };

    let order = model.order();
    let mut recent: Vec<f64> = Vec::with_capacity(order);
    for t in (first + 1)..filled.len() {
        let prev = filled[t - 1].unwrap_or(0.0);
        let value = match filled[t] {
            Some(v) => v,
            None => {
                let v = prev + model.predict_difference(&recent);
                filled[t] = Some(v);
                v
            }
        };
        recent.insert(0, value - prev);
        recent.truncate(order);
    }

    filled
}

/// Gap-fill a dense series
///
/// Gaps after the first observation are forecast forward; leading gaps are
/// backcast with a model fitted on the time-reversed series.
pub fn impute(slots: &[Option<f64>], max_order: usize) -> Result<Vec<f64>, ImputationError> {
    let first = slots
        .iter()
        .position(Option::is_some)
        .ok_or(ImputationError::InsufficientData {
            observed: 0,
            required: 1,
        })?;

    let model = fit(slots, max_order)?;
    let mut filled = forecast_forward(slots, &model);

    if first > 0 {
        let reversed: Vec<Option<f64>> = slots.iter().rev().copied().collect();
        let backward = fit(&reversed, max_order)?;
        let backcast = forecast_forward(&reversed, &backward);
        let n = slots.len();
        for t in 0..first {
            filled[t] = backcast[n - 1 - t];
        }
    }

    let mut out = Vec::with_capacity(filled.len());
    for (t, value) in filled.into_iter().enumerate() {
        match value {
            Some(v) if v.is_finite() => out.push(v),
            _ => {
                return Err(ImputationError::NonConvergence(format!(
                    "forecast diverged at slot {}",
                    t
                )))
            }
        }
    }
    Ok(out)
}
