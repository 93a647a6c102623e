use crate::forecast::cache::{ModelCache, ModelKey};
use crate::forecast::error::ModelError;
use crate::forecast::fallback::MovingAverageFallback;
use crate::forecast::seasonal::{FittedSeasonal, SeasonalModel};
use crate::series::loader::HistoricalSeries;
use crate::types::forecast_point::{ForecastMethod, ForecastPoint, HistoricalPoint};
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Stages a forecast passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForecastState {
    NoHistory,
    InsufficientHistory,
    Fitting,
    Fitted,
    FitFailed,
    Fallback,
}

impl fmt::Display for ForecastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForecastState::NoHistory => "NO_HISTORY",
            ForecastState::InsufficientHistory => "INSUFFICIENT_HISTORY",
            ForecastState::Fitting => "FITTING",
            ForecastState::Fitted => "FITTED",
            ForecastState::FitFailed => "FIT_FAILED",
            ForecastState::Fallback => "FALLBACK",
        };
        f.write_str(name)
    }
}

pub(crate) fn log_transition(entity: &str, from: Option<ForecastState>, to: ForecastState) {
    match from {
        Some(from) => debug!("Forecast '{}': {} -> {}", entity, from, to),
        None => debug!("Forecast '{}': {}", entity, to),
    }
}

/// Model echoes for observed days and predictions for the days after them.
#[derive(Debug, Clone, PartialEq)]
pub struct FitterOutput {
    pub method: ForecastMethod,
    /// One echo per observed day, paired with the actual value.
    pub historical: Vec<HistoricalPoint>,
    /// Strictly after the last observed day.
    pub predictions: Vec<ForecastPoint>,
    pub from_cache: bool,
}

/// Fits the seasonal model, falling back to a moving average when it fails.
#[derive(Debug, Clone, Copy)]
pub struct Fitter<'a> {
    cache: &'a ModelCache,
    model: SeasonalModel,
    fallback: MovingAverageFallback,
}

impl<'a> Fitter<'a> {
    pub fn new(
        cache: &'a ModelCache,
        model: SeasonalModel,
        fallback: MovingAverageFallback,
    ) -> Self {
        Self {
            cache,
            model,
            fallback,
        }
    }

    /// Forecasts `horizon_days` past the last point of `series`. Model errors are
    /// logged and answered with the fallback; they are never returned.
    pub async fn fit(&self, series: &HistoricalSeries, horizon_days: u32) -> FitterOutput {
        log_transition(&series.entity, None, ForecastState::Fitting);
        let key = ModelKey::for_series(series);

        let mut from_cache = false;
        let cached = match &key {
            Some(key) => self.cache.get(key).await,
            None => None,
        };
        let fitted = match cached {
            Some(model) => {
                from_cache = true;
                Ok(model)
            }
            None => self.model.fit(series).map(Arc::new),
        };

        let primary = fitted.and_then(|model| {
            let output = primary_output(&model, series, horizon_days, from_cache)?;
            Ok((model, output))
        });

        match primary {
            Ok((model, output)) => {
                if let (Some(key), false) = (key, from_cache) {
                    self.cache.insert(key, model).await;
                }
                log_transition(
                    &series.entity,
                    Some(ForecastState::Fitting),
                    ForecastState::Fitted,
                );
                output
            }
            Err(e) => {
                log_transition(
                    &series.entity,
                    Some(ForecastState::Fitting),
                    ForecastState::FitFailed,
                );
                warn!(
                    "Seasonal model failed for '{}' ({} points): {}. Using moving-average fallback.",
                    series.entity,
                    series.len(),
                    e
                );
                let output = self.fallback_output(series, horizon_days);
                log_transition(
                    &series.entity,
                    Some(ForecastState::FitFailed),
                    ForecastState::Fallback,
                );
                output
            }
        }
    }

    fn fallback_output(&self, series: &HistoricalSeries, horizon_days: u32) -> FitterOutput {
        let estimate = self.fallback.estimate(&series.values());
        let historical = series
            .points
            .iter()
            .map(|p| HistoricalPoint {
                point: estimate.point(p.date),
                actual: p.value,
            })
            .collect();
        let predictions = horizon_dates(series.last_date(), horizon_days)
            .map(|date| estimate.point(date))
            .collect();
        FitterOutput {
            method: ForecastMethod::FallbackSma,
            historical,
            predictions,
            from_cache: false,
        }
    }
}

fn primary_output(
    model: &FittedSeasonal,
    series: &HistoricalSeries,
    horizon_days: u32,
    from_cache: bool,
) -> Result<FitterOutput, ModelError> {
    let historical = series
        .points
        .iter()
        .map(|p| {
            model.predict(p.date).map(|point| HistoricalPoint {
                point,
                actual: p.value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let predictions = horizon_dates(series.last_date(), horizon_days)
        .map(|date| model.predict(date))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FitterOutput {
        method: ForecastMethod::PrimaryModel,
        historical,
        predictions,
        from_cache,
    })
}

/// Stops early instead of overflowing when the horizon runs past the calendar.
fn horizon_dates(last: Option<NaiveDate>, horizon_days: u32) -> impl Iterator<Item = NaiveDate> {
    let days = if last.is_some() { horizon_days } else { 0 };
    (1..=i64::from(days))
        .map_while(move |offset| last?.checked_add_signed(Duration::days(offset)))
}
