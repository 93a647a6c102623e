use crate::store::error::StoreError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("No observation matches entity '{0}'")]
    EntityNotFound(String),

    #[error("Failed to read observations from the store")]
    Store(#[from] StoreError),

    #[error("Failed to aggregate daily series: {0}")]
    Frame(#[from] PolarsError),

    #[error("Day number {0} is outside the supported calendar")]
    DateOutOfRange(i32),
}
