use crate::series::error::SeriesError;
use crate::store::error::StoreError;
use thiserror::Error;

/// Failures of the seasonal model. These never reach callers of a forecast; the
/// fitter recovers from them with the moving-average fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Need at least {needed} points to fit the model, got {found}")]
    TooFewPoints { found: usize, needed: usize },

    #[error("Model design matrix is singular")]
    SingularDesign,

    #[error("Model produced a non-finite {0}")]
    NonFinite(&'static str),

    #[error("Interval width {0} must lie strictly between 0 and 1")]
    InvalidIntervalWidth(f64),
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("No data available for '{entity}' even after fetching from the source")]
    DataUnavailable { entity: String },

    #[error("Insufficient history for '{entity}': need at least {needed} points, found {found}")]
    InsufficientHistory {
        entity: String,
        found: usize,
        needed: usize,
    },

    #[error("Horizon of {requested} days exceeds the maximum of {max}")]
    HorizonTooLong { requested: u32, max: u32 },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("Failed to access the observation store")]
    Store(#[from] StoreError),
}
