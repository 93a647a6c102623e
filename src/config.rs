//! Tunables of the engine, with the defaults used when a field is left out.

use crate::forecast::fallback::{
    MovingAverageFallback, DEFAULT_FALLBACK_SIGMA, DEFAULT_FALLBACK_WINDOW,
};
use crate::forecast::report::{ReportOptions, DEFAULT_BEST_DATES, DEFAULT_HISTORICAL_ECHOES};
use crate::forecast::seasonal::{SeasonalModel, DEFAULT_INTERVAL_WIDTH};
use crate::series::matching::MatchStrategy;
use crate::series::synthetic::{DEFAULT_SYNTHETIC_BASE, DEFAULT_SYNTHETIC_DAYS};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NEIGHBOURS: usize = 3;
pub const DEFAULT_MIN_POINTS: usize = 10;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;
pub const DEFAULT_HORIZON_DAYS: u32 = 30;
/// Longest horizon and synthetic history accepted, about ten years of days.
pub const MAX_HORIZON_DAYS: u32 = 3660;
pub const MAX_SYNTHETIC_DAYS: usize = 3660;
pub const DEFAULT_MODEL_TTL_SECS: u64 = 3600;
pub const DEFAULT_SOURCE_REGION: &str = "wonosobo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// # Examples
///
/// ```
/// use agrocast::config::EngineConfig;
///
/// let config = EngineConfig::builder().neighbours(5).min_points(14).build();
/// assert_eq!(config.neighbours, 5);
/// assert_eq!(config.horizon_days, 30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct EngineConfig {
    /// Neighbours used by inverse distance weighting.
    #[builder(default = DEFAULT_NEIGHBOURS)]
    pub neighbours: usize,
    /// Fewest daily points the seasonal model is fitted on.
    #[builder(default = DEFAULT_MIN_POINTS)]
    pub min_points: usize,
    #[builder(default = DEFAULT_LOOKBACK_DAYS)]
    pub lookback_days: u32,
    #[builder(default = DEFAULT_HORIZON_DAYS)]
    pub horizon_days: u32,
    #[builder(default)]
    pub match_strategy: MatchStrategy,
    #[builder(default = DEFAULT_INTERVAL_WIDTH)]
    pub interval_width: f64,
    #[builder(default = DEFAULT_FALLBACK_WINDOW)]
    pub fallback_window: usize,
    #[builder(default = DEFAULT_FALLBACK_SIGMA)]
    pub fallback_sigma: f64,
    #[builder(default = DEFAULT_BEST_DATES)]
    pub best_dates: usize,
    #[builder(default = DEFAULT_HISTORICAL_ECHOES)]
    pub historical_echoes: usize,
    #[builder(default = DEFAULT_MODEL_TTL_SECS)]
    pub model_ttl_secs: u64,
    #[builder(default = DEFAULT_SYNTHETIC_DAYS)]
    pub synthetic_days: usize,
    /// Anchor of a synthetic series when no real value exists.
    #[builder(default = DEFAULT_SYNTHETIC_BASE)]
    pub synthetic_base: f64,
    pub synthetic_seed: Option<u64>,
    /// Write predictions of real series back to the store.
    #[builder(default = true)]
    pub persist_predictions: bool,
    /// Region passed to the observation source on a refresh.
    #[builder(into, default = DEFAULT_SOURCE_REGION.to_string())]
    pub source_region: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl EngineConfig {
    pub async fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neighbours == 0 {
            return Err(invalid("neighbours", "must be at least 1"));
        }
        if self.min_points < 2 {
            return Err(invalid("min_points", "must be at least 2"));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(invalid(
                "interval_width",
                format!("{} is not in (0, 1)", self.interval_width),
            ));
        }
        if self.horizon_days > MAX_HORIZON_DAYS {
            return Err(invalid(
                "horizon_days",
                format!("must be at most {}", MAX_HORIZON_DAYS),
            ));
        }
        if self.fallback_window == 0 {
            return Err(invalid("fallback_window", "must be at least 1"));
        }
        if !self.fallback_sigma.is_finite() || self.fallback_sigma < 0.0 {
            return Err(invalid("fallback_sigma", "must be finite and non-negative"));
        }
        if !(2..=MAX_SYNTHETIC_DAYS).contains(&self.synthetic_days) {
            return Err(invalid(
                "synthetic_days",
                format!("must be between 2 and {}", MAX_SYNTHETIC_DAYS),
            ));
        }
        if !self.synthetic_base.is_finite() || self.synthetic_base <= 0.0 {
            return Err(invalid("synthetic_base", "must be finite and positive"));
        }
        Ok(())
    }

    pub fn model_ttl(&self) -> Duration {
        Duration::from_secs(self.model_ttl_secs)
    }

    pub fn seasonal_model(&self) -> Result<SeasonalModel, ConfigError> {
        SeasonalModel::new(self.interval_width)
            .map_err(|e| invalid("interval_width", e.to_string()))
    }

    pub fn fallback(&self) -> MovingAverageFallback {
        MovingAverageFallback::new(self.fallback_window, self.fallback_sigma)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            best_dates: self.best_dates,
            historical_echoes: self.historical_echoes,
        }
    }
}
