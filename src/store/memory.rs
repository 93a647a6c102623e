use crate::store::error::StoreError;
use crate::store::{ObservationQuery, ObservationStore, UpsertOutcome};
use crate::types::forecast_point::ForecastPoint;
use crate::types::observation::{Observation, ObservationKey, Payload, SeriesField};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    observations: BTreeMap<ObservationKey, Observation>,
    forecasts: HashMap<String, BTreeMap<chrono::NaiveDate, ForecastPoint>>,
}

/// An [`ObservationStore`] held in process memory.
///
/// Every operation runs under one lock acquisition, so the lookup and write of an
/// upsert cannot interleave with another batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `observations`; later duplicates of a key win.
    pub fn with_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut tables = Tables::default();
        for observation in observations {
            let observation = canonical(observation);
            tables.observations.insert(observation.key(), observation);
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    pub async fn len(&self) -> usize {
        self.tables.lock().await.observations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// Keys are built from trimmed names; the stored row carries the same spelling.
fn canonical(mut observation: Observation) -> Observation {
    let key = observation.key();
    observation.entity = key.entity;
    observation.location = key.location;
    observation
}

fn has_finite_values(observation: &Observation) -> bool {
    match &observation.payload {
        Payload::Price { price, .. } => price.is_finite(),
        Payload::Weather(reading) => [
            reading.temperature,
            reading.humidity,
            reading.rainfall,
            reading.wind_speed,
        ]
        .iter()
        .all(|v| v.is_finite()),
    }
}

impl ObservationStore for MemoryStore {
    async fn query(&self, query: &ObservationQuery) -> Result<Vec<Observation>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Observation> = tables
            .observations
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        drop(tables);
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.location.cmp(&b.location))
                .then_with(|| a.entity.cmp(&b.entity))
        });
        Ok(rows)
    }

    async fn upsert(&self, observation: Observation) -> Result<UpsertOutcome, StoreError> {
        if !has_finite_values(&observation) {
            return Err(StoreError::WriteRejected(format!(
                "non-finite value for {}/{} on {}",
                observation.entity.trim(),
                observation.location.trim(),
                observation.date
            )));
        }
        let observation = canonical(observation);
        let mut tables = self.tables.lock().await;
        let outcome = match tables.observations.insert(observation.key(), observation) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        Ok(outcome)
    }

    async fn insert_forecast(&self, entity: &str, point: ForecastPoint) -> Result<(), StoreError> {
        if ![point.estimate, point.lower, point.upper].iter().all(|v| v.is_finite()) {
            return Err(StoreError::WriteRejected(format!(
                "non-finite forecast for {} on {}",
                entity.trim(),
                point.date
            )));
        }
        let mut tables = self.tables.lock().await;
        tables
            .forecasts
            .entry(entity.trim().to_string())
            .or_default()
            .insert(point.date, point);
        Ok(())
    }

    async fn entities(&self, field: SeriesField) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().await;
        let names: BTreeSet<&str> = tables
            .observations
            .values()
            .filter(|o| o.value(field).is_some())
            .map(|o| o.entity.as_str())
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    async fn forecasts(&self, entity: &str) -> Result<Vec<ForecastPoint>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .forecasts
            .get(entity.trim())
            .map(|points| points.values().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::matching::EntityMatcher;
    use crate::types::forecast_point::ForecastMethod;
    use crate::types::observation::{Payload, WeatherReading};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_existing_key() {
        let store = MemoryStore::new();
        let first = Observation::price("Cabai", "Wonosobo Kota", d(1), 40_000.0, "feed");
        let second = Observation::price(" Cabai", "Wonosobo Kota ", d(1), 42_000.0, "feed");

        assert_eq!(store.upsert(first).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(second).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.len().await, 1);

        let rows = store.query(&ObservationQuery::new()).await.unwrap();
        assert_eq!(
            rows[0].payload,
            Payload::Price {
                price: 42_000.0,
                unit: None
            }
        );
    }

    #[tokio::test]
    async fn query_orders_by_date_then_location() {
        let store = MemoryStore::with_observations([
            Observation::price("Cabai", "Pasar Wage", d(2), 1.0, "feed"),
            Observation::price("Cabai", "Pasar Kertek", d(2), 2.0, "feed"),
            Observation::price("Cabai", "Pasar Wage", d(1), 3.0, "feed"),
        ]);
        let rows = store
            .query(&ObservationQuery::new().entity(EntityMatcher::exact("Cabai")))
            .await
            .unwrap();
        let order: Vec<(u32, &str)> = rows
            .iter()
            .map(|o| (chrono::Datelike::day(&o.date), o.location.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(1, "Pasar Wage"), (2, "Pasar Kertek"), (2, "Pasar Wage")]
        );
    }

    #[tokio::test]
    async fn entities_are_distinct_per_field() {
        let store = MemoryStore::with_observations([
            Observation::price("Cabai", "Pasar Wage", d(1), 1.0, "feed"),
            Observation::price("Cabai", "Pasar Kertek", d(1), 1.0, "feed"),
            Observation::price("Bawang", "Pasar Wage", d(1), 1.0, "feed"),
            Observation::weather("KERTEK", d(1), WeatherReading::default(), "bmkg"),
        ]);
        assert_eq!(
            store.entities(SeriesField::Price).await.unwrap(),
            vec!["Bawang", "Cabai"]
        );
        assert_eq!(
            store.entities(SeriesField::Rainfall).await.unwrap(),
            vec!["KERTEK"]
        );
    }

    #[tokio::test]
    async fn forecasts_replace_same_date() {
        let store = MemoryStore::new();
        let point = |estimate| ForecastPoint {
            date: d(5),
            estimate,
            lower: estimate - 1.0,
            upper: estimate + 1.0,
            method: ForecastMethod::FallbackSma,
        };
        store.insert_forecast("Cabai", point(1.0)).await.unwrap();
        store.insert_forecast("Cabai", point(2.0)).await.unwrap();
        let stored = store.forecasts("Cabai").await.unwrap();
        assert_eq!(stored, vec![point(2.0)]);
        assert!(store.forecasts("Bawang").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_finite_writes_are_rejected() {
        let store = MemoryStore::new();
        let price = Observation::price("Cabai", "Pasar Wage", d(1), f64::NAN, "feed");
        assert!(matches!(
            store.upsert(price).await,
            Err(StoreError::WriteRejected(_))
        ));
        let reading = WeatherReading {
            rainfall: f64::INFINITY,
            ..WeatherReading::default()
        };
        let weather = Observation::weather("KERTEK", d(1), reading, "bmkg");
        assert!(store.upsert(weather).await.is_err());
        assert!(store.is_empty().await);

        let point = ForecastPoint {
            date: d(5),
            estimate: 1.0,
            lower: f64::NEG_INFINITY,
            upper: 2.0,
            method: ForecastMethod::PrimaryModel,
        };
        assert!(matches!(
            store.insert_forecast("Cabai", point).await,
            Err(StoreError::WriteRejected(_))
        ));
        assert!(store.forecasts("Cabai").await.unwrap().is_empty());
    }
}
