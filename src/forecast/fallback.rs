use crate::types::forecast_point::{ForecastMethod, ForecastPoint};
use chrono::NaiveDate;

pub const DEFAULT_FALLBACK_WINDOW: usize = 7;
pub const DEFAULT_FALLBACK_SIGMA: f64 = 3.0;

/// Flat estimate from the mean of the most recent points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageFallback {
    window: usize,
    default_sigma: f64,
}

/// Mean and sample standard deviation over the fallback window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackEstimate {
    pub mean: f64,
    pub sigma: f64,
}

impl Default for MovingAverageFallback {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_WINDOW, DEFAULT_FALLBACK_SIGMA)
    }
}

impl MovingAverageFallback {
    /// `default_sigma` is used when the window holds fewer than two points.
    pub fn new(window: usize, default_sigma: f64) -> Self {
        Self {
            window: window.max(1),
            default_sigma,
        }
    }

    /// Estimates from the last `min(window, len)` of `values`. An empty slice gives a
    /// zero mean.
    pub fn estimate(&self, values: &[f64]) -> FallbackEstimate {
        let recent = &values[values.len().saturating_sub(self.window)..];
        let n = recent.len();
        if n == 0 {
            return FallbackEstimate {
                mean: 0.0,
                sigma: self.default_sigma,
            };
        }
        let mean = recent.iter().sum::<f64>() / n as f64;
        let sigma = if n < 2 {
            self.default_sigma
        } else {
            let ss: f64 = recent.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        };
        FallbackEstimate { mean, sigma }
    }
}

impl FallbackEstimate {
    pub fn point(&self, date: NaiveDate) -> ForecastPoint {
        ForecastPoint {
            date,
            estimate: self.mean,
            lower: self.mean - self.sigma,
            upper: self.mean + self.sigma,
            method: ForecastMethod::FallbackSma,
        }
    }
}
