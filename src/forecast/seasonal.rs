//! Trend plus Fourier seasonality model with normal-theory prediction intervals.
//!
//! The trend is fitted by ordinary least squares on days since the first point and
//! the Fourier blocks on the detrended residual, through slightly ridged normal
//! equations. The two steps alternate for a fixed number of backfitting rounds.

use crate::forecast::error::ModelError;
use crate::series::loader::HistoricalSeries;
use crate::types::forecast_point::{ForecastMethod, ForecastPoint};
use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.8;

const MIN_POINTS: usize = 2;
const YEARLY_MIN_POINTS: usize = 365;
const BACKFIT_ROUNDS: usize = 10;
const RIDGE: f64 = 1e-8;
const PIVOT_EPSILON: f64 = 1e-12;
const CONSTANT_COLUMN_EPSILON: f64 = 1e-9;
const SIGMA_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct FourierBlock {
    period_days: f64,
    order: u32,
}

const DAILY: FourierBlock = FourierBlock {
    period_days: 1.0,
    order: 4,
};
const WEEKLY: FourierBlock = FourierBlock {
    period_days: 7.0,
    order: 3,
};
const YEARLY: FourierBlock = FourierBlock {
    period_days: 365.25,
    order: 10,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Sin,
    Cos,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FourierTerm {
    period_days: f64,
    harmonic: u32,
    phase: Phase,
}

impl FourierTerm {
    fn eval(&self, t: f64) -> f64 {
        let angle = 2.0 * PI * f64::from(self.harmonic) * t / self.period_days;
        match self.phase {
            Phase::Sin => angle.sin(),
            Phase::Cos => angle.cos(),
        }
    }
}

impl FourierBlock {
    fn terms(self) -> impl Iterator<Item = FourierTerm> {
        (1..=self.order).flat_map(move |harmonic| {
            [Phase::Sin, Phase::Cos].map(|phase| FourierTerm {
                period_days: self.period_days,
                harmonic,
                phase,
            })
        })
    }
}

/// Fitting parameters of the seasonal model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalModel {
    interval_width: f64,
}

impl Default for SeasonalModel {
    fn default() -> Self {
        Self {
            interval_width: DEFAULT_INTERVAL_WIDTH,
        }
    }
}

impl SeasonalModel {
    /// `interval_width` is the central coverage of the prediction bounds, e.g. 0.8.
    pub fn new(interval_width: f64) -> Result<Self, ModelError> {
        if !(interval_width > 0.0 && interval_width < 1.0) {
            return Err(ModelError::InvalidIntervalWidth(interval_width));
        }
        Ok(Self { interval_width })
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }

    pub fn fit(&self, series: &HistoricalSeries) -> Result<FittedSeasonal, ModelError> {
        let n = series.len();
        let (Some(origin), Some(last_date)) = (series.first_date(), series.last_date()) else {
            return Err(ModelError::TooFewPoints {
                found: n,
                needed: MIN_POINTS,
            });
        };
        if n < MIN_POINTS {
            return Err(ModelError::TooFewPoints {
                found: n,
                needed: MIN_POINTS,
            });
        }

        let t: Vec<f64> = series
            .points
            .iter()
            .map(|p| (p.date - origin).num_days() as f64)
            .collect();
        let y = series.values();

        let blocks: &[FourierBlock] = if n >= YEARLY_MIN_POINTS {
            &[DAILY, WEEKLY, YEARLY]
        } else {
            &[DAILY, WEEKLY]
        };
        // Sub-daily terms are constant on day-resolution data and carry no information.
        let terms: Vec<FourierTerm> = blocks
            .iter()
            .flat_map(|block| block.terms())
            .filter(|term| !is_constant(t.iter().map(|&ti| term.eval(ti))))
            .collect();
        let columns: Vec<Vec<f64>> = terms
            .iter()
            .map(|term| t.iter().map(|&ti| term.eval(ti)).collect())
            .collect();

        let mut seasonal = vec![0.0; n];
        let mut coefficients = Vec::new();
        let (mut intercept, mut slope) = (0.0, 0.0);
        for _ in 0..BACKFIT_ROUNDS {
            let deseasonalized: Vec<f64> =
                y.iter().zip(&seasonal).map(|(v, s)| v - s).collect();
            (intercept, slope) = linear_trend(&t, &deseasonalized)?;
            if columns.is_empty() {
                break;
            }
            let detrended: Vec<f64> = t
                .iter()
                .zip(&y)
                .map(|(ti, yi)| yi - (intercept + slope * ti))
                .collect();
            coefficients = ridge_least_squares(&columns, &detrended)?;
            seasonal = (0..n)
                .map(|i| {
                    columns
                        .iter()
                        .zip(&coefficients)
                        .map(|(column, beta)| beta * column[i])
                        .sum()
                })
                .collect();
        }

        if !(intercept.is_finite()
            && slope.is_finite()
            && coefficients.iter().all(|c| c.is_finite()))
        {
            return Err(ModelError::NonFinite("coefficient"));
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|_| ModelError::NonFinite("quantile"))?
            .inverse_cdf((1.0 + self.interval_width) / 2.0);

        let mut fitted = FittedSeasonal {
            origin,
            last_date,
            n,
            intercept,
            slope,
            terms,
            coefficients,
            sigma: SIGMA_FLOOR,
            z,
        };
        let mean_square = t
            .iter()
            .zip(&y)
            .map(|(&ti, yi)| (yi - fitted.value_at(ti)).powi(2))
            .sum::<f64>()
            / n as f64;
        fitted.sigma = mean_square.sqrt().max(SIGMA_FLOOR);
        if !fitted.sigma.is_finite() {
            return Err(ModelError::NonFinite("residual deviation"));
        }
        Ok(fitted)
    }
}

/// A fitted [`SeasonalModel`], ready to predict any date.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedSeasonal {
    origin: NaiveDate,
    last_date: NaiveDate,
    n: usize,
    intercept: f64,
    slope: f64,
    terms: Vec<FourierTerm>,
    coefficients: Vec<f64>,
    sigma: f64,
    z: f64,
}

impl FittedSeasonal {
    /// Residual standard deviation of the fit.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Daily slope of the trend component.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn points(&self) -> usize {
        self.n
    }

    /// Number of seasonal columns left after dropping constant ones.
    pub fn seasonal_terms(&self) -> usize {
        self.terms.len()
    }

    fn value_at(&self, t: f64) -> f64 {
        let seasonal: f64 = self
            .terms
            .iter()
            .zip(&self.coefficients)
            .map(|(term, beta)| beta * term.eval(t))
            .sum();
        self.intercept + self.slope * t + seasonal
    }

    /// Predicts `date`. Bounds widen with the number of days past the last fitted point.
    pub fn predict(&self, date: NaiveDate) -> Result<ForecastPoint, ModelError> {
        let t = (date - self.origin).num_days() as f64;
        let steps_ahead = (date - self.last_date).num_days().max(0) as f64;
        let estimate = self.value_at(t);
        let half_width = self.z * self.sigma * (1.0 + steps_ahead / self.n as f64).sqrt();
        if !(estimate.is_finite() && half_width.is_finite()) {
            return Err(ModelError::NonFinite("prediction"));
        }
        Ok(ForecastPoint {
            date,
            estimate,
            lower: estimate - half_width,
            upper: estimate + half_width,
            method: ForecastMethod::PrimaryModel,
        })
    }
}

fn linear_trend(t: &[f64], y: &[f64]) -> Result<(f64, f64), ModelError> {
    let n = t.len() as f64;
    let t_mean = t.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let (sxx, sxy) = t
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxx, sxy), (ti, yi)| {
            let dt = ti - t_mean;
            (sxx + dt * dt, sxy + dt * (yi - y_mean))
        });
    if sxx < PIVOT_EPSILON {
        return Err(ModelError::SingularDesign);
    }
    let slope = sxy / sxx;
    Ok((y_mean - slope * t_mean, slope))
}

fn is_constant(values: impl Iterator<Item = f64>) -> bool {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    hi - lo < CONSTANT_COLUMN_EPSILON
}

// Solves (XᵀX + λI) β = Xᵀr for the seasonal columns X.
fn ridge_least_squares(columns: &[Vec<f64>], residual: &[f64]) -> Result<Vec<f64>, ModelError> {
    let m = columns.len();
    let mut gram = vec![vec![0.0; m]; m];
    let mut rhs = vec![0.0; m];
    for i in 0..m {
        for j in i..m {
            let dot: f64 = columns[i].iter().zip(&columns[j]).map(|(a, b)| a * b).sum();
            gram[i][j] = dot;
            gram[j][i] = dot;
        }
        gram[i][i] += RIDGE;
        rhs[i] = columns[i].iter().zip(residual).map(|(a, r)| a * r).sum();
    }
    solve_linear(gram, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ModelError> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(ModelError::SingularDesign)?;
        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return Err(ModelError::SingularDesign);
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
