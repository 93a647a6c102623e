mod agrocast;
mod error;
mod utils;

pub mod clock;
pub mod config;
pub mod forecast;
pub mod ingest;
pub mod series;
pub mod source;
pub mod spatial;
pub mod store;
pub mod types;

pub use agrocast::*;
pub use error::AgrocastError;

pub use config::{ConfigError, EngineConfig};
pub use forecast::error::{ForecastError, ModelError};
pub use forecast::report::{BestDate, ForecastReport, ForecastStatistics, Trend};
pub use ingest::raw_record::RawRecord;
pub use ingest::reconciler::ReconcileSummary;
pub use series::error::SeriesError;
pub use series::matching::MatchStrategy;
pub use source::error::SourceError;
pub use spatial::error::{InterpolationError, LocationTableError};
pub use spatial::interpolator::{EstimatedObservation, Provenance};
pub use store::error::StoreError;
pub use types::forecast_point::{ForecastMethod, ForecastPoint, HistoricalPoint};
pub use types::location::{LatLon, Location};
pub use types::observation::{Observation, SeriesField, WeatherReading};
pub use types::weather_condition::{RiskLevel, WeatherCondition};
