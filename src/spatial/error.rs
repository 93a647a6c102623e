use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationTableError {
    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    // Covers errors joining tokio blocking tasks
    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("Location '{0}' is not in the coordinate table")]
    UnknownLocation(String),

    #[error("No neighbouring location has weather data for {date} to estimate '{location}'")]
    NoCandidates { location: String, date: NaiveDate },

    #[error("Interpolation needs at least one neighbour")]
    ZeroNeighbours,
}
