//! Great-circle distance and inverse-distance weights.

use crate::types::location::LatLon;
use haversine::{distance, Location as HaversineLocation, Units};

/// Offset added to distances before weighting, in km. Keeps the weight finite
/// for co-located points.
pub const DISTANCE_EPSILON_KM: f64 = 0.1;

/// Great-circle distance between two coordinates in kilometres (R = 6371 km).
pub fn haversine_km(from: LatLon, to: LatLon) -> f64 {
    distance(
        HaversineLocation {
            latitude: from.0,
            longitude: from.1,
        },
        HaversineLocation {
            latitude: to.0,
            longitude: to.1,
        },
        Units::Kilometers,
    )
}

/// Inverse-distance-squared weight `1 / (d + ε)²`.
pub fn idw_weight(distance_km: f64) -> f64 {
    let d = distance_km.max(0.0) + DISTANCE_EPSILON_KM;
    1.0 / (d * d)
}

/// Weighted mean of `(value, distance_km)` pairs using [`idw_weight`].
///
/// Returns `None` for an empty input.
///
/// # Examples
///
/// ```rust
/// use agrocast::spatial::distance::idw_average;
///
/// let t = idw_average(&[(20.0, 1.0), (22.0, 2.0), (24.0, 4.0)]).unwrap();
/// assert!((t - 20.62).abs() < 0.01);
/// ```
pub fn idw_average(samples: &[(f64, f64)]) -> Option<f64> {
    let (weighted, total) = samples
        .iter()
        .fold((0.0, 0.0), |(weighted, total), &(value, distance_km)| {
            let w = idw_weight(distance_km);
            (weighted + value * w, total + w)
        });
    (total > 0.0).then(|| weighted / total)
}
