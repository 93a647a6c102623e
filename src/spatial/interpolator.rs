//! Inverse-distance-weighted estimation of weather for locations without a
//! same-day observation.

use crate::spatial::distance::{idw_average, idw_weight};
use crate::spatial::error::InterpolationError;
use crate::spatial::location_table::LocationTable;
use crate::types::forecast_point::{ForecastMethod, ForecastPoint};
use crate::types::location::normalize_name;
use crate::types::observation::{Observation, SeriesField, WeatherReading};
use crate::types::weather_condition::{RiskLevel, WeatherCondition};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Source tag written on interpolated observations.
pub const INTERPOLATED_SOURCE: &str = "interpolated";
/// Source tag written on placeholder observations.
pub const PLACEHOLDER_SOURCE: &str = "placeholder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationMethod {
    pub k: usize,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IDW,k={}", self.k)
    }
}

/// One neighbour that contributed to an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    pub location: String,
    pub distance_km: f64,
    /// Raw inverse-distance weight, before normalization.
    pub weight: f64,
}

/// Lowest and highest candidate value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub field: SeriesField,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationDetails {
    pub method: InterpolationMethod,
    /// Contributing neighbours, nearest first.
    pub sources: Vec<SourceContribution>,
    pub ranges: Vec<FieldRange>,
}

impl InterpolationDetails {
    pub fn range(&self, field: SeriesField) -> Option<&FieldRange> {
        self.ranges.iter().find(|r| r.field == field)
    }
}

/// Where an [`EstimatedObservation`] came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provenance", rename_all = "snake_case")]
pub enum Provenance {
    /// A recorded observation, returned unchanged.
    Direct,
    /// Estimated from neighbouring observations.
    Interpolated(InterpolationDetails),
    /// Filler values built by the caller when nothing could be estimated. Not authoritative.
    Placeholder,
}

/// A weather observation for a location and day together with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedObservation {
    pub observation: Observation,
    pub condition: WeatherCondition,
    pub risk: RiskLevel,
    pub provenance: Provenance,
}

impl EstimatedObservation {
    fn classified(
        observation: Observation,
        reading: &WeatherReading,
        provenance: Provenance,
    ) -> Self {
        Self {
            condition: WeatherCondition::from_reading(reading),
            risk: RiskLevel::from_reading(reading),
            observation,
            provenance,
        }
    }

    /// A zeroed reading for `location` on `date`, tagged [`Provenance::Placeholder`].
    pub fn placeholder(location: &str, date: NaiveDate) -> Self {
        let reading = WeatherReading::default();
        Self::classified(
            Observation::weather(location, date, reading, PLACEHOLDER_SOURCE),
            &reading,
            Provenance::Placeholder,
        )
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.provenance, Provenance::Direct)
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self.provenance, Provenance::Interpolated(_))
    }

    pub fn reading(&self) -> Option<&WeatherReading> {
        self.observation.weather_reading()
    }

    /// Expresses an interpolated field as a forecast point whose bounds are the
    /// candidate range. `None` for direct and placeholder observations.
    pub fn to_forecast_point(&self, field: SeriesField) -> Option<ForecastPoint> {
        let Provenance::Interpolated(details) = &self.provenance else {
            return None;
        };
        let estimate = self.observation.value(field)?;
        let range = details.range(field)?;
        Some(ForecastPoint {
            date: self.observation.date,
            estimate,
            lower: range.min,
            upper: range.max,
            method: ForecastMethod::Interpolated,
        })
    }
}

/// Estimates weather readings from the nearest locations that have data.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'a> {
    table: &'a LocationTable,
}

impl<'a> Interpolator<'a> {
    pub fn new(table: &'a LocationTable) -> Self {
        Self { table }
    }

    /// Estimates the reading at `target` on `date` from `same_day` observations.
    ///
    /// A direct observation of the target is returned unchanged. Otherwise the `k`
    /// nearest other locations with a reading that day are IDW-averaged per field.
    pub fn interpolate(
        &self,
        target: &str,
        date: NaiveDate,
        k: usize,
        same_day: &[Observation],
    ) -> Result<EstimatedObservation, InterpolationError> {
        let target_key = normalize_name(target);

        let direct = same_day.iter().find_map(|o| {
            let reading = o.weather_reading()?;
            (o.date == date && normalize_name(&o.location) == target_key).then_some((o, *reading))
        });
        if let Some((observation, reading)) = direct {
            debug!("Direct observation for {} on {}", target_key, date);
            return Ok(EstimatedObservation::classified(
                observation.clone(),
                &reading,
                Provenance::Direct,
            ));
        }

        let target_location = self
            .table
            .get(&target_key)
            .ok_or_else(|| InterpolationError::UnknownLocation(target.trim().to_string()))?;
        if k == 0 {
            return Err(InterpolationError::ZeroNeighbours);
        }

        // First reading per location wins; locations outside the table are skipped.
        let mut readings: HashMap<String, &WeatherReading> = HashMap::new();
        for observation in same_day.iter().filter(|o| o.date == date) {
            let Some(reading) = observation.weather_reading() else {
                continue;
            };
            let key = normalize_name(&observation.location);
            if key == target_key || !self.table.contains(&key) {
                continue;
            }
            readings.entry(key).or_insert(reading);
        }

        let neighbours = self.table.nearest(target_location.coordinates(), k, |l| {
            readings.contains_key(&l.name)
        });
        if neighbours.is_empty() {
            return Err(InterpolationError::NoCandidates {
                location: target_location.name.clone(),
                date,
            });
        }

        let mut estimate = WeatherReading::default();
        let mut ranges = Vec::with_capacity(SeriesField::WEATHER.len());
        for field in SeriesField::WEATHER {
            let samples: Vec<(f64, f64)> = neighbours
                .iter()
                .filter_map(|(l, d)| readings[&l.name].get(field).map(|v| (v, *d)))
                .collect();
            let Some(value) = idw_average(&samples) else {
                continue;
            };
            estimate.set(field, value);
            let (min, max) = samples
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(v, _)| {
                    (lo.min(v), hi.max(v))
                });
            ranges.push(FieldRange { field, min, max });
        }

        let sources = neighbours
            .iter()
            .map(|(l, d)| SourceContribution {
                location: l.name.clone(),
                distance_km: *d,
                weight: idw_weight(*d),
            })
            .collect();
        let details = InterpolationDetails {
            method: InterpolationMethod { k },
            sources,
            ranges,
        };
        debug!(
            "Interpolated {} on {} with {} from {} neighbours",
            target_location.name,
            date,
            details.method,
            details.sources.len()
        );

        Ok(EstimatedObservation::classified(
            Observation::weather(&target_location.name, date, estimate, INTERPOLATED_SOURCE),
            &estimate,
            Provenance::Interpolated(details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::location::Location;
    use approx::assert_relative_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
    }

    fn reading(temperature: f64, rainfall: f64) -> WeatherReading {
        WeatherReading {
            temperature,
            humidity: 80.0,
            rainfall,
            wind_speed: 5.0,
        }
    }

    fn obs(location: &str, temperature: f64, rainfall: f64) -> Observation {
        Observation::weather(location, date(), reading(temperature, rainfall), "bmkg")
    }

    // Neighbours along the equator at roughly 1, 2 and 4 km from T, offset so that the
    // haversine distances equal the reference distances.
    fn line_table() -> LocationTable {
        let km = 1.0 / 111.194_926_6;
        LocationTable::new(vec![
            Location::new("T", 0.0, 0.0),
            Location::new("A", 0.0, km),
            Location::new("B", 0.0, 2.0 * km),
            Location::new("C", 0.0, 4.0 * km),
            Location::new("D", 0.0, 8.0 * km),
        ])
    }

    #[test]
    fn weighted_temperature_for_reference_distances() {
        let table = line_table();
        let same_day = vec![obs("A", 20.0, 0.0), obs("B", 22.0, 0.0), obs("C", 24.0, 0.0)];
        let est = Interpolator::new(&table)
            .interpolate("t", date(), 3, &same_day)
            .unwrap();

        let reading = est.reading().unwrap();
        assert_relative_eq!(reading.temperature, 20.62, epsilon = 0.01);
        assert_eq!(est.observation.source, INTERPOLATED_SOURCE);

        let Provenance::Interpolated(details) = &est.provenance else {
            panic!("expected interpolated provenance");
        };
        assert_eq!(details.method.to_string(), "IDW,k=3");
        let weights: Vec<f64> = details.sources.iter().map(|s| s.weight).collect();
        assert_relative_eq!(weights[0], 0.826, epsilon = 2e-3);
        assert_relative_eq!(weights[1], 0.227, epsilon = 2e-3);
        assert_relative_eq!(weights[2], 0.059, epsilon = 2e-3);
        let range = details.range(SeriesField::Temperature).unwrap();
        assert_eq!((range.min, range.max), (20.0, 24.0));
    }

    #[test]
    fn only_k_nearest_contribute() {
        let table = line_table();
        let same_day = vec![obs("D", 40.0, 0.0), obs("A", 20.0, 0.0), obs("B", 22.0, 0.0)];
        let est = Interpolator::new(&table)
            .interpolate("T", date(), 2, &same_day)
            .unwrap();
        let Provenance::Interpolated(details) = &est.provenance else {
            panic!("expected interpolated provenance");
        };
        let used: Vec<&str> = details.sources.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(used, vec!["A", "B"]);
        assert!(est.reading().unwrap().temperature < 22.0);
    }

    #[test]
    fn direct_observation_is_returned_unchanged() {
        let table = line_table();
        let direct = obs("T", 18.0, 16.0);
        let same_day = vec![obs("A", 20.0, 0.0), direct.clone()];
        let est = Interpolator::new(&table)
            .interpolate("T", date(), 3, &same_day)
            .unwrap();
        assert!(est.is_direct());
        assert_eq!(est.observation, direct);
        assert_eq!(est.condition, WeatherCondition::HeavyRain);
        assert_eq!(est.risk, RiskLevel::High);
        assert!(est.to_forecast_point(SeriesField::Temperature).is_none());
    }

    #[test]
    fn unknown_and_empty_are_distinct_errors() {
        let table = line_table();
        let interpolator = Interpolator::new(&table);
        assert_eq!(
            interpolator.interpolate("NOWHERE", date(), 3, &[obs("A", 20.0, 0.0)]),
            Err(InterpolationError::UnknownLocation("NOWHERE".to_string()))
        );
        assert_eq!(
            interpolator.interpolate("T", date(), 3, &[]),
            Err(InterpolationError::NoCandidates {
                location: "T".to_string(),
                date: date()
            })
        );
        assert_eq!(
            interpolator.interpolate("T", date(), 0, &[obs("A", 20.0, 0.0)]),
            Err(InterpolationError::ZeroNeighbours)
        );
    }

    #[test]
    fn other_days_and_unlisted_locations_are_ignored() {
        let table = line_table();
        let mut yesterday = obs("A", 30.0, 0.0);
        yesterday.date = date().pred_opt().unwrap();
        let same_day = vec![yesterday, obs("ELSEWHERE", 10.0, 0.0)];
        let result = Interpolator::new(&table).interpolate("T", date(), 3, &same_day);
        assert!(matches!(result, Err(InterpolationError::NoCandidates { .. })));
    }

    #[test]
    fn forecast_point_uses_candidate_range() {
        let table = line_table();
        let same_day = vec![obs("A", 20.0, 2.0), obs("B", 22.0, 8.0)];
        let est = Interpolator::new(&table)
            .interpolate("T", date(), 3, &same_day)
            .unwrap();
        let point = est.to_forecast_point(SeriesField::Rainfall).unwrap();
        assert_eq!(point.method, ForecastMethod::Interpolated);
        assert_eq!((point.lower, point.upper), (2.0, 8.0));
        assert!(point.lower <= point.estimate && point.estimate <= point.upper);
        assert!(est.to_forecast_point(SeriesField::Price).is_none());
    }

    #[test]
    fn placeholder_is_tagged() {
        let est = EstimatedObservation::placeholder("KEPIL", date());
        assert_eq!(est.provenance, Provenance::Placeholder);
        assert_eq!(est.observation.source, PLACEHOLDER_SOURCE);
        assert_eq!(est.condition, WeatherCondition::Cold);
        assert!(!est.is_interpolated());
    }
}
