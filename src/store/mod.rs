//! Persistence seam for observations and predictions.

pub mod error;
pub mod memory;

use crate::series::matching::EntityMatcher;
use crate::store::error::StoreError;
use crate::types::date_range::DateRange;
use crate::types::forecast_point::ForecastPoint;
use crate::types::location::normalize_name;
use crate::types::observation::{Observation, SeriesField};
use std::future::Future;

/// Filter for [`ObservationStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationQuery {
    pub entity: Option<EntityMatcher>,
    /// Compared case-insensitively.
    pub location: Option<String>,
    pub range: Option<DateRange>,
    /// Only observations whose payload carries this field.
    pub field: Option<SeriesField>,
}

impl ObservationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, matcher: EntityMatcher) -> Self {
        self.entity = Some(matcher);
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn field(mut self, field: SeriesField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        let entity_ok = self
            .entity
            .as_ref()
            .map_or(true, |m| m.matches(&observation.entity));
        let location_ok = self
            .location
            .as_ref()
            .map_or(true, |l| normalize_name(l) == normalize_name(&observation.location));
        let range_ok = self.range.map_or(true, |r| r.contains(observation.date));
        let field_ok = self.field.map_or(true, |f| observation.value(f).is_some());
        entity_ok && location_ok && range_ok && field_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Storage for observations keyed by `(entity, location, date)`.
///
/// Implementations must keep at most one observation per
/// [`ObservationKey`](crate::types::observation::ObservationKey): an upsert of an existing
/// key replaces the stored observation wholesale.
pub trait ObservationStore: Send + Sync {
    /// Observations matching `query`, ordered by date then location.
    fn query(
        &self,
        query: &ObservationQuery,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    fn upsert(
        &self,
        observation: Observation,
    ) -> impl Future<Output = Result<UpsertOutcome, StoreError>> + Send;

    /// Records a prediction for `entity`, replacing an earlier one for the same date.
    fn insert_forecast(
        &self,
        entity: &str,
        point: ForecastPoint,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Distinct entity names that carry `field`, sorted.
    fn entities(
        &self,
        field: SeriesField,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Stored predictions for `entity`, ordered by date.
    fn forecasts(
        &self,
        entity: &str,
    ) -> impl Future<Output = Result<Vec<ForecastPoint>, StoreError>> + Send;
}
