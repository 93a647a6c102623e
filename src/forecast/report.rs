//! Turns fitter output into the report handed to callers: statistics, trend and the
//! days with the highest predicted value.

use crate::forecast::fitter::FitterOutput;
use crate::series::loader::HistoricalSeries;
use crate::types::forecast_point::{ForecastMethod, ForecastPoint, HistoricalPoint};
use crate::types::observation::SeriesField;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BEST_DATES: usize = 5;
pub const DEFAULT_HISTORICAL_ECHOES: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub trend: Trend,
    /// Change of the mean prediction relative to the current value, in percent.
    pub percentage_change: f64,
}

/// A future day ranked by predicted value, 1 being the highest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestDate {
    pub rank: usize,
    pub date: NaiveDate,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub entity: String,
    pub field: SeriesField,
    pub method: ForecastMethod,
    /// The history was generated, not observed.
    pub synthetic: bool,
    /// Last actual value.
    pub current_value: f64,
    pub last_observed: Option<NaiveDate>,
    pub history_points: usize,
    /// The most recent model echoes, oldest first.
    pub historical: Vec<HistoricalPoint>,
    pub predictions: Vec<ForecastPoint>,
    pub statistics: ForecastStatistics,
    pub best_dates: Vec<BestDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub best_dates: usize,
    pub historical_echoes: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            best_dates: DEFAULT_BEST_DATES,
            historical_echoes: DEFAULT_HISTORICAL_ECHOES,
        }
    }
}

pub fn assemble(
    series: &HistoricalSeries,
    output: FitterOutput,
    options: ReportOptions,
) -> ForecastReport {
    let current_value = series.last_value().unwrap_or(0.0);
    let statistics = statistics(current_value, &output.predictions);
    let best_dates = best_dates(&output.predictions, options.best_dates);

    let mut historical = output.historical;
    let skip = historical.len().saturating_sub(options.historical_echoes);
    historical.drain(..skip);

    ForecastReport {
        entity: series.entity.clone(),
        field: series.field,
        method: output.method,
        synthetic: series.synthetic,
        current_value,
        last_observed: series.last_date(),
        history_points: series.len(),
        historical,
        predictions: output.predictions,
        statistics,
        best_dates,
    }
}

/// Summary of `predictions` against `current`. With no predictions every figure
/// equals `current` and the trend is flat.
pub fn statistics(current: f64, predictions: &[ForecastPoint]) -> ForecastStatistics {
    if predictions.is_empty() {
        return ForecastStatistics {
            mean: current,
            min: current,
            max: current,
            trend: Trend::Flat,
            percentage_change: 0.0,
        };
    }

    let estimates = predictions.iter().map(|p| p.estimate);
    let mean = estimates.clone().sum::<f64>() / predictions.len() as f64;
    let min = estimates.clone().fold(f64::INFINITY, f64::min);
    let max = estimates.fold(f64::NEG_INFINITY, f64::max);

    let trend = if mean > current {
        Trend::Rising
    } else if mean < current {
        Trend::Falling
    } else {
        Trend::Flat
    };
    let percentage_change = if current == 0.0 {
        0.0
    } else {
        (mean - current) / current * 100.0
    };

    ForecastStatistics {
        mean,
        min,
        max,
        trend,
        percentage_change,
    }
}

/// The `limit` highest predictions. The sort is stable over date-ordered input, so
/// equal estimates keep the earliest date first.
pub fn best_dates(predictions: &[ForecastPoint], limit: usize) -> Vec<BestDate> {
    let mut ranked: Vec<&ForecastPoint> = predictions.iter().collect();
    ranked.sort_by_key(|p| p.date);
    ranked.sort_by(|a, b| b.estimate.total_cmp(&a.estimate));
    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| BestDate {
            rank: i + 1,
            date: p.date,
            estimate: p.estimate,
            lower: p.lower,
            upper: p.upper,
        })
        .collect()
}
