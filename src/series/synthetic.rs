//! Plausible stand-in history for entities with too few observations.

use crate::series::loader::{HistoricalSeries, SeriesPoint};
use crate::types::observation::SeriesField;
use bon::Builder;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;
use std::f64::consts::PI;

pub const DEFAULT_SYNTHETIC_BASE: f64 = 10_000.0;
pub const DEFAULT_SYNTHETIC_DAYS: usize = 90;

const TREND_SHARE: f64 = 0.10;
const SEASONAL_AMPLITUDE: f64 = 0.05;
const SEASONAL_CYCLES: f64 = 2.0;
const NOISE_SHARE: f64 = 0.02;
const NOISE_CLAMP_SIGMAS: f64 = 3.0;
const FLOOR_SHARE: f64 = 0.80;

/// Generates a daily series around `base`: a linear rise of 10% over the window,
/// two sine cycles of 5% amplitude, and clamped Gaussian noise of 2%, floored at
/// 80% of `base`.
///
/// # Examples
///
/// ```rust
/// use agrocast::series::synthetic::SyntheticGenerator;
/// use agrocast::SeriesField;
/// use chrono::NaiveDate;
///
/// let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
/// let series = SyntheticGenerator::builder()
///     .base(18_000.0)
///     .end(end)
///     .seed(7)
///     .build()
///     .generate("Cabai", SeriesField::Price);
///
/// assert!(series.synthetic);
/// assert_eq!(series.len(), 90);
/// assert_eq!(series.last_date(), Some(end));
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SyntheticGenerator {
    #[builder(default = DEFAULT_SYNTHETIC_BASE)]
    base: f64,
    #[builder(default = DEFAULT_SYNTHETIC_DAYS)]
    days: usize,
    /// Date of the last generated point.
    end: NaiveDate,
    /// Fixes the noise for reproducible output.
    seed: Option<u64>,
}

impl SyntheticGenerator {
    pub fn generate(&self, entity: &str, field: SeriesField) -> HistoricalSeries {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise_sd = NOISE_SHARE * self.base;
        let noise = Normal::new(0.0, noise_sd).ok();
        let span = self.days.saturating_sub(1).max(1) as f64;
        let floor = FLOOR_SHARE * self.base;

        // Days before the start of the calendar are dropped.
        let points = (0..self.days)
            .filter_map(|i| {
                let progress = i as f64 / span;
                let trend = self.base * TREND_SHARE * progress;
                let seasonal =
                    self.base * SEASONAL_AMPLITUDE * (2.0 * PI * SEASONAL_CYCLES * progress).sin();
                let jitter = noise.as_ref().map_or(0.0, |n| {
                    let limit = NOISE_CLAMP_SIGMAS * noise_sd;
                    rng.sample(n).clamp(-limit, limit)
                });
                let offset = (self.days - 1 - i) as i64;
                let date = self.end.checked_sub_signed(Duration::days(offset))?;
                Some(SeriesPoint::new(
                    date,
                    (self.base + trend + seasonal + jitter).max(floor),
                ))
            })
            .collect();

        HistoricalSeries {
            entity: entity.to_string(),
            field,
            points,
            synthetic: true,
        }
    }
}
