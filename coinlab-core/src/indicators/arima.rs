//! ARIMA(p, d, q) fit and multi-step forecast.
//!
//! Fitting is deterministic least squares, no random starts:
//! - the series is differenced `d` times;
//! - p = q = 0 fits the mean of the differenced series;
//! - q = 0 fits AR(p) with an intercept by OLS;
//! - q > 0 uses the two-stage Hannan-Rissanen estimator: a long AR fit
//!   supplies residual estimates, which are then regressed on alongside the
//!   AR lags.
//!
//! Forecasts run the fitted recursion forward with future shocks set to zero
//! and undo the differencing level by level.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest accepted ratio between the smallest and largest singular value of
/// a design matrix.
const CONDITION_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Per-bar fit failure. The strategy treats it as a no-op for that bar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFitError {
    #[error("{order} needs {required} observations after differencing, got {available}")]
    TooFewObservations {
        order: ArimaOrder,
        required: usize,
        available: usize,
    },
    #[error("{order} design matrix is singular or ill-conditioned")]
    SingularDesign { order: ArimaOrder },
    #[error("{order} produced a non-finite {what}")]
    NonFinite {
        order: ArimaOrder,
        what: &'static str,
    },
    #[error("forecast horizon must be at least one step")]
    ZeroHorizon,
}

/// A fitted model, holding what the forecast recursion needs.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// The series after `d` differences.
    differenced: Vec<f64>,
    /// In-sample residuals aligned with `differenced`.
    residuals: Vec<f64>,
    /// Last observation at each differencing level 0..d.
    level_tails: Vec<f64>,
    sigma2: f64,
}

impl ArimaModel {
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self, ModelFitError> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ModelFitError::NonFinite {
                order,
                what: "input value",
            });
        }

        let mut level_tails = Vec::with_capacity(order.d);
        let mut differenced = series.to_vec();
        for _ in 0..order.d {
            match differenced.last() {
                Some(&last) if differenced.len() >= 2 => level_tails.push(last),
                _ => {
                    return Err(ModelFitError::TooFewObservations {
                        order,
                        required: order.d + 1,
                        available: series.len(),
                    })
                }
            }
            differenced = difference(&differenced);
        }

        let (constant, ar, ma) = match (order.p, order.q) {
            (0, 0) => {
                if differenced.is_empty() {
                    return Err(ModelFitError::TooFewObservations {
                        order,
                        required: 1,
                        available: 0,
                    });
                }
                (mean(&differenced), Vec::new(), Vec::new())
            }
            (p, 0) => {
                let (constant, ar) = fit_autoregression(&differenced, p, order)?;
                (constant, ar, Vec::new())
            }
            (p, q) => hannan_rissanen(&differenced, p, q, order)?,
        };

        let residuals = recursive_residuals(&differenced, constant, &ar, &ma);
        if residuals.iter().any(|e| !e.is_finite()) {
            return Err(ModelFitError::NonFinite {
                order,
                what: "residual",
            });
        }
        let sigma2 = if residuals.is_empty() {
            0.0
        } else {
            residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64
        };

        Ok(Self {
            order,
            constant,
            ar,
            ma,
            differenced,
            residuals,
            level_tails,
            sigma2,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    /// Mean squared in-sample residual.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Point forecasts for the next `steps` observations, in original scale.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelFitError> {
        if steps == 0 {
            return Err(ModelFitError::ZeroHorizon);
        }

        let mut values = self.differenced.clone();
        let mut shocks = self.residuals.clone();
        let mut ahead = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = one_step(&values, &shocks, self.constant, &self.ar, &self.ma);
            values.push(next);
            shocks.push(0.0);
            ahead.push(next);
        }

        for &tail in self.level_tails.iter().rev() {
            let mut running = tail;
            for value in ahead.iter_mut() {
                running += *value;
                *value = running;
            }
        }

        if ahead.iter().any(|v| !v.is_finite()) {
            return Err(ModelFitError::NonFinite {
                order: self.order,
                what: "forecast",
            });
        }
        Ok(ahead)
    }

    /// The forecast `steps` ahead, i.e. the last value of [`Self::forecast`].
    pub fn forecast_at(&self, steps: usize) -> Result<f64, ModelFitError> {
        self.forecast(steps)?
            .last()
            .copied()
            .ok_or(ModelFitError::ZeroHorizon)
    }
}

fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Lag `lag` (1-based) of `values` as seen from the end, zero before the sample.
fn lagged(values: &[f64], lag: usize) -> f64 {
    values
        .len()
        .checked_sub(lag)
        .and_then(|i| values.get(i))
        .copied()
        .unwrap_or(0.0)
}

fn one_step(values: &[f64], shocks: &[f64], constant: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let ar_part: f64 = ar
        .iter()
        .enumerate()
        .map(|(i, phi)| phi * lagged(values, i + 1))
        .sum();
    let ma_part: f64 = ma
        .iter()
        .enumerate()
        .map(|(j, theta)| theta * lagged(shocks, j + 1))
        .sum();
    constant + ar_part + ma_part
}

/// Residuals from running the fitted recursion over the sample, pre-sample
/// terms taken as zero.
fn recursive_residuals(series: &[f64], constant: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut residuals = Vec::with_capacity(series.len());
    for t in 0..series.len() {
        let fitted = one_step(&series[..t], &residuals, constant, ar, ma);
        residuals.push(series[t] - fitted);
    }
    residuals
}

/// OLS of `series[t]` on an intercept and `p` lags. Returns (intercept, phi).
fn fit_autoregression(
    series: &[f64],
    p: usize,
    order: ArimaOrder,
) -> Result<(f64, Vec<f64>), ModelFitError> {
    let required = 2 * p + 2;
    if series.len() < required {
        return Err(ModelFitError::TooFewObservations {
            order,
            required,
            available: series.len(),
        });
    }

    let rows = series.len() - p;
    let mut design = Vec::with_capacity(rows * (p + 1));
    for t in p..series.len() {
        design.push(1.0);
        design.extend((1..=p).map(|i| series[t - i]));
    }
    let beta = least_squares(rows, p + 1, &design, series[p..].to_vec(), order)?;
    Ok((beta[0], beta[1..].to_vec()))
}

fn hannan_rissanen(
    series: &[f64],
    p: usize,
    q: usize,
    order: ArimaOrder,
) -> Result<(f64, Vec<f64>, Vec<f64>), ModelFitError> {
    let n = series.len();
    let long_order = (p + q + 1).max((n.max(1) as f64).ln().ceil() as usize);
    let start = p.max(long_order + q);
    let required = (2 * long_order + 2).max(start + p + q + 2);
    if n < required {
        return Err(ModelFitError::TooFewObservations {
            order,
            required,
            available: n,
        });
    }

    // Stage 1: innovations from a long autoregression.
    let (long_const, long_ar) = fit_autoregression(series, long_order, order)?;
    let mut innovations = vec![0.0; n];
    for t in long_order..n {
        let fitted = one_step(&series[..t], &[], long_const, &long_ar, &[]);
        innovations[t] = series[t] - fitted;
    }

    // Stage 2: regress on AR lags and lagged innovations.
    let cols = 1 + p + q;
    let rows = n - start;
    let mut design = Vec::with_capacity(rows * cols);
    for t in start..n {
        design.push(1.0);
        design.extend((1..=p).map(|i| series[t - i]));
        design.extend((1..=q).map(|j| innovations[t - j]));
    }
    let beta = least_squares(rows, cols, &design, series[start..].to_vec(), order)?;

    Ok((beta[0], beta[1..=p].to_vec(), beta[1 + p..].to_vec()))
}

fn least_squares(
    rows: usize,
    cols: usize,
    design: &[f64],
    target: Vec<f64>,
    order: ArimaOrder,
) -> Result<Vec<f64>, ModelFitError> {
    let x = DMatrix::from_row_slice(rows, cols, design);
    let y = DVector::from_vec(target);

    let svd = x.svd(true, true);
    let (min_sv, max_sv) = svd
        .singular_values
        .iter()
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if max_sv <= 0.0 || min_sv / max_sv < CONDITION_FLOOR {
        return Err(ModelFitError::SingularDesign { order });
    }

    let beta = svd
        .solve(&y, f64::EPSILON)
        .map_err(|_| ModelFitError::SingularDesign { order })?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ModelFitError::NonFinite {
            order,
            what: "coefficient",
        });
    }
    Ok(beta.iter().copied().collect())
}
