use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tags how a [`ForecastPoint`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastMethod {
    /// Seasonal decomposition model.
    PrimaryModel,
    /// Flat moving-average estimate used when the model cannot be fit.
    FallbackSma,
    /// Spatial IDW estimate.
    Interpolated,
}

impl ForecastMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMethod::PrimaryModel => "primary-model",
            ForecastMethod::FallbackSma => "fallback-sma",
            ForecastMethod::Interpolated => "interpolated",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An estimate for one day with its uncertainty bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub method: ForecastMethod,
}

/// A model echo for an already observed day, paired with the actual value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(flatten)]
    pub point: ForecastPoint,
    pub actual: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tags_are_kebab_case() {
        assert_eq!(
            serde_json::to_value(ForecastMethod::FallbackSma).unwrap(),
            "fallback-sma"
        );
        assert_eq!(ForecastMethod::PrimaryModel.to_string(), "primary-model");
    }
}
