//! This module provides the main entry point: an engine that interpolates missing
//! weather observations between districts and forecasts commodity series.

use crate::clock::Clock;
use crate::config::{EngineConfig, MAX_HORIZON_DAYS};
use crate::error::AgrocastError;
use crate::forecast::cache::ModelCache;
use crate::forecast::error::ForecastError;
use crate::forecast::fitter::{log_transition, Fitter, ForecastState};
use crate::forecast::report::{assemble, ForecastReport};
use crate::forecast::seasonal::SeasonalModel;
use crate::ingest::raw_record::RawRecord;
use crate::ingest::reconciler::{ReconcileSummary, Reconciler};
use crate::series::error::SeriesError;
use crate::series::loader::{HistoricalSeries, SeriesLoader, SeriesRequest, SeriesWindow};
use crate::series::matching::MatchStrategy;
use crate::series::synthetic::SyntheticGenerator;
use crate::source::ObservationSource;
use crate::spatial::error::InterpolationError;
use crate::spatial::interpolator::{EstimatedObservation, Interpolator};
use crate::spatial::location_table::LocationTable;
use crate::store::error::StoreError;
use crate::store::{ObservationQuery, ObservationStore};
use crate::types::date_range::DateRange;
use crate::types::observation::{Observation, SeriesField};
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::NaiveDate;
use futures_util::future::join_all;
use log::{info, warn};
use std::path::PathBuf;

/// Loads the location table from `cache_folder`, or from the platform cache
/// directory when none is given. The folder is created if needed and seeded with
/// the built-in districts on first use.
pub async fn cached_location_table(
    cache_folder: Option<PathBuf>,
) -> Result<LocationTable, AgrocastError> {
    let cache_folder = match cache_folder {
        Some(folder) => folder,
        None => get_cache_dir().map_err(AgrocastError::CacheDirResolution)?,
    };
    ensure_cache_dir_exists(&cache_folder)
        .await
        .map_err(|e| AgrocastError::CacheDirCreation(cache_folder.clone(), e))?;
    Ok(LocationTable::with_cache_folder(&cache_folder).await?)
}

/// The engine. It owns an observation store, a source to refresh it from, a
/// clock, the location table and the model cache.
///
/// # Examples
///
/// ```rust
/// use agrocast::clock::FixedClock;
/// use agrocast::source::EmptySource;
/// use agrocast::store::memory::MemoryStore;
/// use agrocast::types::observation::Observation;
/// use agrocast::{Agrocast, AgrocastError};
/// use chrono::{Duration, NaiveDate};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), AgrocastError> {
/// let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let store = MemoryStore::with_observations((1..=20).map(|i| {
///     let date = today - Duration::days(i);
///     Observation::price("Cabai", "Pasar Induk", date, 40_000.0 + i as f64, "demo")
/// }));
///
/// let engine = Agrocast::builder()
///     .store(store)
///     .source(EmptySource)
///     .clock(FixedClock(today))
///     .build()?;
///
/// let report = engine.forecast("cabai").horizon_days(7).call().await?;
/// assert_eq!(report.predictions.len(), 7);
/// assert!(!report.synthetic);
/// # Ok(())
/// # }
/// ```
pub struct Agrocast<S, X, C> {
    store: S,
    source: X,
    clock: C,
    locations: LocationTable,
    config: EngineConfig,
    seasonal: SeasonalModel,
    models: ModelCache,
}

#[bon]
impl<S, X, C> Agrocast<S, X, C>
where
    S: ObservationStore,
    X: ObservationSource,
    C: Clock,
{
    /// Creates an engine. Without `locations` the built-in Wonosobo table is used,
    /// without `config` the defaults of [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgrocastError::Config`] if the configuration does not validate.
    #[builder]
    pub fn new(
        store: S,
        source: X,
        clock: C,
        locations: Option<LocationTable>,
        config: Option<EngineConfig>,
    ) -> Result<Self, AgrocastError> {
        let config = config.unwrap_or_default();
        config.validate()?;
        let seasonal = config.seasonal_model()?;
        Ok(Self {
            store,
            source,
            clock,
            locations: locations.unwrap_or_default(),
            models: ModelCache::new(config.model_ttl()),
            seasonal,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_cache(&self) -> &ModelCache {
        &self.models
    }

    /// Estimates the weather at `location` on `date` from the same-day observations
    /// in the store.
    ///
    /// # Builder Methods
    ///
    /// * `.neighbours(usize)`: Optional. Neighbours to weight. Defaults to the configured value (3).
    ///
    /// # Errors
    ///
    /// [`InterpolationError::UnknownLocation`] when `location` is not in the table and
    /// has no direct observation, [`InterpolationError::NoCandidates`] when no other
    /// district has a reading that day.
    #[builder(start_fn = interpolate)]
    pub async fn build_interpolate(
        &self,
        #[builder(start_fn)] location: &str,
        #[builder(start_fn)] date: NaiveDate,
        neighbours: Option<usize>,
    ) -> Result<EstimatedObservation, AgrocastError> {
        let same_day = self.same_day_weather(date).await?;
        let k = neighbours.unwrap_or(self.config.neighbours);
        Ok(Interpolator::new(&self.locations).interpolate(location, date, k, &same_day)?)
    }

    /// Estimates every name in `locations` on `date`, one store query for all of
    /// them. Per-location failures are returned next to the name.
    pub async fn bulk_interpolate<L: AsRef<str>>(
        &self,
        date: NaiveDate,
        locations: &[L],
    ) -> Result<Vec<(String, Result<EstimatedObservation, InterpolationError>)>, StoreError> {
        let same_day = self.same_day_weather(date).await?;
        let interpolator = Interpolator::new(&self.locations);
        let k = self.config.neighbours;
        let results = locations
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (
                    name.to_string(),
                    interpolator.interpolate(name, date, k, &same_day),
                )
            })
            .collect();
        Ok(results)
    }

    /// [`Self::bulk_interpolate`] over every district of the location table.
    pub async fn interpolate_all(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<(String, Result<EstimatedObservation, InterpolationError>)>, StoreError> {
        let mut names: Vec<String> = self.locations.iter().map(|l| l.name.clone()).collect();
        names.sort();
        self.bulk_interpolate(date, &names).await
    }

    async fn same_day_weather(&self, date: NaiveDate) -> Result<Vec<Observation>, StoreError> {
        self.store
            .query(
                &ObservationQuery::new()
                    .range(DateRange::day(date))
                    .field(SeriesField::Temperature),
            )
            .await
    }

    /// Forecasts `entity` for the coming days.
    ///
    /// Without history in the lookback window the source is asked once for fresh
    /// records. Too short a history is replaced by a synthetic one when allowed, and
    /// model failures fall back to a moving average.
    ///
    /// # Builder Methods
    ///
    /// * `.field(SeriesField)`: Optional. Defaults to [`SeriesField::Price`].
    /// * `.horizon_days(u32)`: Optional. Defaults to the configured value (30).
    /// * `.lookback_days(u32)`: Optional. Defaults to the configured value (90).
    /// * `.allow_synthetic(bool)`: Optional. Defaults to `true`.
    /// * `.match_strategy(MatchStrategy)`: Optional. Defaults to the configured strategy.
    /// * `.location(&str)`: Optional. Restricts the history to one market.
    ///
    /// # Errors
    ///
    /// [`ForecastError::DataUnavailable`] when nothing is known even after a refresh,
    /// [`ForecastError::InsufficientHistory`] when synthetic history is disallowed and
    /// [`ForecastError::HorizonTooLong`] past [`MAX_HORIZON_DAYS`].
    #[builder(start_fn = forecast)]
    pub async fn build_forecast(
        &self,
        #[builder(start_fn)] entity: &str,
        field: Option<SeriesField>,
        horizon_days: Option<u32>,
        lookback_days: Option<u32>,
        allow_synthetic: Option<bool>,
        match_strategy: Option<MatchStrategy>,
        location: Option<&str>,
    ) -> Result<ForecastReport, ForecastError> {
        let today = self.clock.today();
        let field = field.unwrap_or_default();
        let horizon_days = horizon_days.unwrap_or(self.config.horizon_days);
        if horizon_days > MAX_HORIZON_DAYS {
            return Err(ForecastError::HorizonTooLong {
                requested: horizon_days,
                max: MAX_HORIZON_DAYS,
            });
        }
        let request = SeriesRequest::builder()
            .entity(entity)
            .field(field)
            .window(SeriesWindow::LookbackDays(
                lookback_days.unwrap_or(self.config.lookback_days),
            ))
            .maybe_location(location)
            .strategy(match_strategy.unwrap_or(self.config.match_strategy))
            .build();

        let series = self.load_or_refresh(&request, today).await?;
        let series = self.ensure_enough_history(series, allow_synthetic.unwrap_or(true), today)?;

        let fitter = Fitter::new(&self.models, self.seasonal, self.config.fallback());
        let output = fitter.fit(&series, horizon_days).await;
        let report = assemble(&series, output, self.config.report_options());

        if self.config.persist_predictions && !series.synthetic {
            for point in &report.predictions {
                self.store.insert_forecast(&series.entity, *point).await?;
            }
        }
        info!(
            "Forecast '{}' {}: {} predictions via {}{}",
            report.entity,
            report.field,
            report.predictions.len(),
            report.method,
            if report.synthetic { " (synthetic)" } else { "" }
        );
        Ok(report)
    }

    /// Runs one forecast per entity concurrently, with defaults apart from the horizon.
    pub async fn forecast_many<E: AsRef<str> + Sync>(
        &self,
        entities: &[E],
        horizon_days: u32,
    ) -> Vec<(String, Result<ForecastReport, ForecastError>)> {
        let runs = entities.iter().map(|entity| async move {
            let entity = entity.as_ref();
            let result = self.forecast(entity).horizon_days(horizon_days).call().await;
            (entity.to_string(), result)
        });
        join_all(runs).await
    }

    pub async fn reconcile(&self, batch: &[RawRecord]) -> Result<ReconcileSummary, StoreError> {
        Reconciler::new(&self.store, &self.clock)
            .reconcile(batch)
            .await
    }

    /// Commodities with at least one stored price, sorted.
    pub async fn available_entities(&self) -> Result<Vec<String>, StoreError> {
        self.store.entities(SeriesField::Price).await
    }

    /// Pulls the configured region from the source into the store. A failed fetch
    /// is logged and treated as an empty one.
    pub async fn refresh(&self) -> Result<ReconcileSummary, StoreError> {
        let region = &self.config.source_region;
        let records = match self.source.fetch(region).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Fetching '{}' from the observation source failed: {}", region, e);
                Vec::new()
            }
        };
        if records.is_empty() {
            info!("Observation source returned no records for '{}'", region);
            return Ok(ReconcileSummary::default());
        }
        self.reconcile(&records).await
    }

    async fn load_or_refresh(
        &self,
        request: &SeriesRequest,
        today: NaiveDate,
    ) -> Result<HistoricalSeries, ForecastError> {
        let loader = SeriesLoader::new(&self.store);
        if let Some(series) = non_empty(loader.load(request, today).await)? {
            return Ok(series);
        }

        log_transition(&request.entity, None, ForecastState::NoHistory);
        self.refresh().await?;
        match non_empty(loader.load(request, today).await)? {
            Some(series) => Ok(series),
            None => {
                warn!(
                    "No {} history for '{}' after refreshing from the source",
                    request.field, request.entity
                );
                Err(ForecastError::DataUnavailable {
                    entity: request.entity.clone(),
                })
            }
        }
    }

    fn ensure_enough_history(
        &self,
        series: HistoricalSeries,
        allow_synthetic: bool,
        today: NaiveDate,
    ) -> Result<HistoricalSeries, ForecastError> {
        let needed = self.config.min_points;
        let found = series.len();
        if found >= needed {
            return Ok(series);
        }

        log_transition(&series.entity, None, ForecastState::InsufficientHistory);
        if !allow_synthetic {
            return Err(ForecastError::InsufficientHistory {
                entity: series.entity,
                found,
                needed,
            });
        }

        let base = series.last_value().unwrap_or(self.config.synthetic_base);
        let end = series.last_date().unwrap_or(today);
        warn!(
            "'{}' has {} of {} points, generating {} synthetic days around {}",
            series.entity,
            found,
            needed,
            self.config.synthetic_days,
            base
        );
        Ok(SyntheticGenerator::builder()
            .base(base)
            .days(self.config.synthetic_days)
            .end(end)
            .maybe_seed(self.config.synthetic_seed)
            .build()
            .generate(&series.entity, series.field))
    }
}

/// An empty window and an unknown entity both mean there is nothing to forecast from.
fn non_empty(
    loaded: Result<HistoricalSeries, SeriesError>,
) -> Result<Option<HistoricalSeries>, SeriesError> {
    match loaded {
        Ok(series) if !series.is_empty() => Ok(Some(series)),
        Ok(_) | Err(SeriesError::EntityNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::forecast::report::Trend;
    use crate::source::{EmptySource, StaticSource};
    use crate::spatial::interpolator::Provenance;
    use crate::store::memory::MemoryStore;
    use crate::types::forecast_point::ForecastMethod;
    use crate::types::observation::WeatherReading;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn prices(entity: &str, values: &[f64]) -> Vec<Observation> {
        let n = values.len() as i64;
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let date = today() - Duration::days(n - i as i64);
                Observation::price(entity, "Pasar Induk", date, v, "test")
            })
            .collect()
    }

    fn weather(location: &str, temperature: f64, rainfall: f64) -> Observation {
        let reading = WeatherReading {
            temperature,
            humidity: 80.0,
            rainfall,
            wind_speed: 2.0,
        };
        Observation::weather(location, today(), reading, "test")
    }

    fn engine(store: MemoryStore) -> Agrocast<MemoryStore, EmptySource, FixedClock> {
        Agrocast::builder()
            .store(store)
            .source(EmptySource)
            .clock(FixedClock(today()))
            .config(EngineConfig::builder().synthetic_seed(1).build())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn forecast_persists_predictions_after_last_date() -> Result<(), AgrocastError> {
        let values: Vec<f64> = (0..30).map(|i| 20_000.0 + 50.0 * i as f64).collect();
        let engine = engine(MemoryStore::with_observations(prices("Cabai", &values)));

        let report = engine.forecast("Cabai").horizon_days(5).call().await?;
        assert_eq!(report.method, ForecastMethod::PrimaryModel);
        assert_eq!(report.predictions.len(), 5);
        assert_eq!(report.statistics.trend, Trend::Rising);
        let last = report.last_observed.unwrap();
        assert!(report.predictions.iter().all(|p| p.date > last));
        assert!(report.historical.iter().all(|h| h.point.date <= last));

        let stored = engine.store().forecasts("Cabai").await?;
        assert_eq!(stored.len(), 5);
        assert_eq!(engine.model_cache().len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn short_history_uses_synthetic_series() -> Result<(), AgrocastError> {
        let engine = engine(MemoryStore::with_observations(prices(
            "Bawang",
            &[30_000.0, 30_500.0, 31_000.0],
        )));

        let report = engine.forecast("bawang").horizon_days(3).call().await?;
        assert!(report.synthetic);
        assert_eq!(report.history_points, 90);
        assert_eq!(report.predictions.len(), 3);
        assert!(engine.store().forecasts("bawang").await?.is_empty());
        assert!(engine.model_cache().is_empty().await);

        let err = engine
            .forecast("bawang")
            .allow_synthetic(false)
            .call()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory {
                found: 3,
                needed: 10,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn predictions_are_stored_under_the_stored_spelling() -> Result<(), AgrocastError> {
        let values: Vec<f64> = (0..20).map(|i| 25_000.0 + 10.0 * i as f64).collect();
        let engine = engine(MemoryStore::with_observations(prices("Cabai", &values)));

        let report = engine.forecast("  cabai ").horizon_days(4).call().await?;
        assert_eq!(report.entity, "Cabai");
        assert_eq!(engine.store().forecasts("Cabai").await?.len(), 4);
        assert!(engine.store().forecasts("  cabai ").await?.is_empty());
        assert!(engine.store().forecasts("cabai").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn horizon_past_the_cap_is_rejected() {
        let values: Vec<f64> = (0..20).map(|i| 25_000.0 + 10.0 * i as f64).collect();
        let engine = engine(MemoryStore::with_observations(prices("Cabai", &values)));

        let err = engine
            .forecast("Cabai")
            .horizon_days(u32::MAX)
            .call()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::HorizonTooLong {
                requested: u32::MAX,
                max: MAX_HORIZON_DAYS
            }
        ));
        assert!(engine.store().forecasts("Cabai").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_entity_is_data_unavailable() {
        let engine = engine(MemoryStore::new());
        let err = engine.forecast("Durian").call().await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { entity } if entity == "Durian"));
    }

    #[tokio::test]
    async fn missing_history_is_fetched_from_source() -> Result<(), AgrocastError> {
        let records: Vec<RawRecord> = (1..=12)
            .map(|i| {
                let date = (today() - Duration::days(i)).format("%Y-%m-%d").to_string();
                RawRecord::price("Jagung", "Pasar Kertek", &date, 7_000.0 + i as f64)
            })
            .collect();
        let engine = Agrocast::builder()
            .store(MemoryStore::new())
            .source(StaticSource::new(records))
            .clock(FixedClock(today()))
            .build()?;

        let report = engine.forecast("Jagung").horizon_days(2).call().await?;
        assert!(!report.synthetic);
        assert_eq!(report.history_points, 12);
        assert_eq!(engine.available_entities().await?, vec!["Jagung".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn forecast_many_reports_each_entity() {
        let mut observations = prices("Cabai", &[18_000.0; 12]);
        observations.extend(prices("Tomat", &[9_000.0; 12]));
        let engine = engine(MemoryStore::with_observations(observations));

        let results = engine.forecast_many(&["Cabai", "Tomat", "Durian"], 3).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "Cabai");
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_ok());
        assert!(matches!(
            results[2].1,
            Err(ForecastError::DataUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn interpolate_prefers_direct_then_neighbours() -> Result<(), AgrocastError> {
        let engine = engine(MemoryStore::with_observations(vec![
            weather("KERTEK", 22.0, 2.0),
            weather("GARUNG", 20.0, 18.0),
            weather("SELOMERTO", 24.0, 6.0),
        ]));

        let direct = engine.interpolate("Kertek", today()).call().await?;
        assert!(direct.is_direct());

        let estimate = engine.interpolate("WONOSOBO", today()).call().await?;
        let Provenance::Interpolated(details) = &estimate.provenance else {
            panic!("expected an interpolated estimate");
        };
        assert_eq!(details.sources.len(), 3);
        let t = estimate.reading().unwrap().temperature;
        assert!((20.0..=24.0).contains(&t));

        let two = engine
            .interpolate("WONOSOBO", today())
            .neighbours(2)
            .call()
            .await?;
        assert!(matches!(&two.provenance, Provenance::Interpolated(d) if d.sources.len() == 2));

        let err = engine.interpolate("ATLANTIS", today()).call().await.unwrap_err();
        assert!(matches!(
            err,
            AgrocastError::Interpolation(InterpolationError::UnknownLocation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn bulk_interpolation_reports_per_location() -> Result<(), AgrocastError> {
        let engine = engine(MemoryStore::with_observations(vec![weather(
            "KERTEK", 22.0, 2.0,
        )]));
        let results = engine
            .bulk_interpolate(today(), &["KERTEK", "WONOSOBO", "ATLANTIS"])
            .await?;
        assert!(results[0].1.as_ref().unwrap().is_direct());
        assert!(results[1].1.as_ref().unwrap().is_interpolated());
        assert!(matches!(
            results[2].1,
            Err(InterpolationError::UnknownLocation(_))
        ));

        let all = engine.interpolate_all(today() + Duration::days(1)).await?;
        assert_eq!(all.len(), 15);
        assert!(all
            .iter()
            .all(|(_, r)| matches!(r, Err(InterpolationError::NoCandidates { .. }))));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let result = Agrocast::builder()
            .store(MemoryStore::new())
            .source(EmptySource)
            .clock(FixedClock(today()))
            .config(EngineConfig::builder().interval_width(1.5).build())
            .build();
        assert!(matches!(result, Err(AgrocastError::Config(_))));
    }

    #[tokio::test]
    async fn location_table_is_cached_in_folder() -> Result<(), AgrocastError> {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("cache");
        let table = cached_location_table(Some(folder.clone())).await?;
        assert_eq!(table.len(), 15);
        assert!(folder.join("locations.bin").exists());
        Ok(())
    }
}
