use crate::series::error::SeriesError;
use crate::series::matching::{EntityMatcher, MatchStrategy};
use crate::store::{ObservationQuery, ObservationStore};
use crate::types::date_range::DateRange;
use crate::types::observation::{Observation, SeriesField};
use bon::Builder;
use chrono::{Datelike, NaiveDate};
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One aggregated day of a [`HistoricalSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A chronologically ordered series with at most one point per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub entity: String,
    pub field: SeriesField,
    pub points: Vec<SeriesPoint>,
    /// Generated rather than observed.
    pub synthetic: bool,
}

impl HistoricalSeries {
    pub fn new(entity: &str, field: SeriesField, points: Vec<SeriesPoint>) -> Self {
        Self {
            entity: entity.to_string(),
            field,
            points,
            synthetic: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// The days a series is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesWindow {
    /// The given number of days up to and including today.
    LookbackDays(u32),
    Range(DateRange),
}

impl SeriesWindow {
    pub fn resolve(self, today: NaiveDate) -> DateRange {
        match self {
            SeriesWindow::LookbackDays(days) => DateRange::lookback(today, days),
            SeriesWindow::Range(range) => range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SeriesRequest {
    #[builder(into)]
    pub entity: String,
    #[builder(default)]
    pub field: SeriesField,
    pub window: SeriesWindow,
    /// Restrict to one market or district.
    #[builder(into)]
    pub location: Option<String>,
    #[builder(default)]
    pub strategy: MatchStrategy,
}

/// Reads observations from a store and turns them into daily series.
#[derive(Debug)]
pub struct SeriesLoader<'a, S> {
    store: &'a S,
}

impl<'a, S: ObservationStore> SeriesLoader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Loads the series described by `request`, resolving lookback windows against `today`.
    ///
    /// An empty window is `Ok` with no points; [`SeriesError::EntityNotFound`] means no
    /// observation of any date matches the entity.
    pub async fn load(
        &self,
        request: &SeriesRequest,
        today: NaiveDate,
    ) -> Result<HistoricalSeries, SeriesError> {
        let matcher = EntityMatcher::new(&request.entity, request.strategy);
        let range = request.window.resolve(today);

        let mut query = ObservationQuery::new()
            .entity(matcher.clone())
            .range(range)
            .field(request.field);
        if let Some(location) = &request.location {
            query = query.location(location);
        }
        let rows = self.store.query(&query).await?;

        if rows.is_empty() {
            let known = self
                .store
                .query(&ObservationQuery::new().entity(matcher))
                .await?;
            if known.is_empty() {
                return Err(SeriesError::EntityNotFound(request.entity.clone()));
            }
        }

        let samples: Vec<(NaiveDate, f64)> = rows
            .iter()
            .filter_map(|o| o.value(request.field).map(|v| (o.date, v)))
            .collect();
        let points = aggregate_daily(&samples)?;
        debug!(
            "Loaded {} {} points for '{}' ({} raw rows, {} to {})",
            points.len(),
            request.field,
            request.entity,
            rows.len(),
            range.start,
            range.end
        );

        Ok(HistoricalSeries::new(
            canonical_entity(&rows, &request.entity),
            request.field,
            points,
        ))
    }
}

/// The stored spelling when every row belongs to one entity, otherwise the
/// trimmed query.
fn canonical_entity<'r>(rows: &'r [Observation], query: &'r str) -> &'r str {
    let mut names = rows.iter().map(|o| o.entity.as_str());
    match names.next() {
        Some(first) if names.all(|n| n == first) => first,
        _ => query.trim(),
    }
}

/// Collapses `(date, value)` samples to one mean value per day, ordered by date.
/// Non-finite values are ignored.
pub fn aggregate_daily(samples: &[(NaiveDate, f64)]) -> Result<Vec<SeriesPoint>, SeriesError> {
    let (days, values): (Vec<i32>, Vec<f64>) = samples
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(d, v)| (d.num_days_from_ce(), *v))
        .unzip();
    if days.is_empty() {
        return Ok(Vec::new());
    }

    let frame = df!("day" => days, "value" => values)?
        .lazy()
        .group_by([col("day")])
        .agg([col("value").mean()])
        .sort(["day"], SortMultipleOptions::default())
        .collect()?;

    let day_column = frame.column("day")?.i32()?;
    let value_column = frame.column("value")?.f64()?;

    day_column
        .into_iter()
        .zip(value_column.into_iter())
        .filter_map(|(day, value)| day.zip(value))
        .map(|(day, value)| {
            NaiveDate::from_num_days_from_ce_opt(day)
                .map(|date| SeriesPoint::new(date, value))
                .ok_or(SeriesError::DateOutOfRange(day))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::observation::WeatherReading;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn same_day_values_are_averaged_not_summed() {
        let points =
            aggregate_daily(&[(d(2), 30.0), (d(1), 10.0), (d(2), 50.0), (d(1), f64::NAN)])
                .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SeriesPoint::new(d(1), 10.0));
        assert_eq!(points[1].date, d(2));
        assert_relative_eq!(points[1].value, 40.0);
    }

    #[test]
    fn empty_samples_give_empty_series() {
        assert!(aggregate_daily(&[]).unwrap().is_empty());
    }

    fn store() -> MemoryStore {
        MemoryStore::with_observations([
            Observation::price("Cabai Merah", "Pasar Wage", d(1), 40_000.0, "feed"),
            Observation::price("Cabai Merah", "Pasar Kertek", d(1), 44_000.0, "feed"),
            Observation::price("Cabai Merah", "Pasar Wage", d(3), 41_000.0, "feed"),
            Observation::price("Bawang", "Pasar Wage", d(1), 30_000.0, "feed"),
            Observation::weather("KERTEK", d(1), WeatherReading::default(), "bmkg"),
        ])
    }

    #[tokio::test]
    async fn loads_daily_means_for_matching_entity() {
        let store = store();
        let request = SeriesRequest::builder()
            .entity("cabai")
            .window(SeriesWindow::LookbackDays(30))
            .build();
        let series = SeriesLoader::new(&store).load(&request, d(10)).await.unwrap();

        assert_eq!(series.values(), vec![42_000.0, 41_000.0]);
        assert_eq!(series.entity, "Cabai Merah");
        assert_eq!(series.last_date(), Some(d(3)));
        assert!(!series.synthetic);
    }

    #[tokio::test]
    async fn several_matching_entities_keep_the_query_name() {
        let store = MemoryStore::with_observations([
            Observation::price("Cabai Merah", "Pasar Wage", d(1), 40_000.0, "feed"),
            Observation::price("Cabai Rawit", "Pasar Wage", d(1), 50_000.0, "feed"),
        ]);
        let request = SeriesRequest::builder()
            .entity(" cabai ")
            .window(SeriesWindow::LookbackDays(30))
            .build();
        let series = SeriesLoader::new(&store).load(&request, d(10)).await.unwrap();
        assert_eq!(series.entity, "cabai");
        assert_eq!(series.values(), vec![45_000.0]);
    }

    #[tokio::test]
    async fn location_filter_restricts_markets() {
        let store = store();
        let request = SeriesRequest::builder()
            .entity("Cabai Merah")
            .strategy(MatchStrategy::Exact)
            .window(SeriesWindow::Range(DateRange::new(d(1), d(31))))
            .location("pasar kertek")
            .build();
        let series = SeriesLoader::new(&store).load(&request, d(10)).await.unwrap();
        assert_eq!(series.values(), vec![44_000.0]);
    }

    #[tokio::test]
    async fn empty_window_differs_from_unknown_entity() {
        let store = store();
        let loader = SeriesLoader::new(&store);
        let in_future = SeriesRequest::builder()
            .entity("Bawang")
            .window(SeriesWindow::Range(DateRange::new(d(20), d(31))))
            .build();
        assert!(loader.load(&in_future, d(10)).await.unwrap().is_empty());

        let unknown = SeriesRequest::builder()
            .entity("Kentang")
            .window(SeriesWindow::LookbackDays(30))
            .build();
        assert!(matches!(
            loader.load(&unknown, d(10)).await,
            Err(SeriesError::EntityNotFound(name)) if name == "Kentang"
        ));
    }

    #[tokio::test]
    async fn weather_fields_load_from_weather_payloads() {
        let store = store();
        let request = SeriesRequest::builder()
            .entity("KERTEK")
            .field(SeriesField::Temperature)
            .window(SeriesWindow::LookbackDays(30))
            .build();
        let series = SeriesLoader::new(&store).load(&request, d(10)).await.unwrap();
        assert_eq!(series.len(), 1);
    }
}
