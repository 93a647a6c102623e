use crate::config::ConfigError;
use crate::forecast::error::ForecastError;
use crate::series::error::SeriesError;
use crate::source::error::SourceError;
use crate::spatial::error::{InterpolationError, LocationTableError};
use crate::store::error::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgrocastError {
    #[error(transparent)]
    LocationTable(#[from] LocationTableError),

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
