//! Defines the static coordinate reference data used for spatial interpolation,
//! including the implementations needed to index locations in an `rstar` R-tree.

use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude in degrees.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use agrocast::LatLon;
///
/// let wonosobo = LatLon(-7.3667, 110.0);
/// assert_eq!(wonosobo.0, -7.3667); // Latitude
/// assert_eq!(wonosobo.1, 110.0); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

/// A named place with fixed coordinates.
///
/// Names are matched case-insensitively; [`Location::key`] gives the normalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Display name (e.g. "KEJAJAR").
    pub name: String,
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn coordinates(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }

    /// Normalized lookup key for this location's name.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Normalizes a location name for case-insensitive lookups.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

// A location is a degenerate AABB around its single point.
impl RTreeObject for Location {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.latitude, self.longitude])
    }
}

/// Squared planar distance in degree space. Only used to walk the tree in roughly
/// nearest-first order; real distances are computed with haversine.
impl PointDistance for Location {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.latitude - point[0];
        let dy = self.longitude - point[1];
        dx * dx + dy * dy
    }
}
