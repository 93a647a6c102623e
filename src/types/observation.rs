//! Defines the recorded observation types: commodity prices and weather readings,
//! keyed by entity, location and calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single recorded measurement for an entity at a location on a given day.
///
/// For commodity prices the entity is the commodity name and the location the market.
/// For weather the entity is the location name itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Commodity name or, for weather readings, the location name.
    pub entity: String,
    /// Market or district the measurement belongs to.
    pub location: String,
    /// Calendar day of the measurement.
    pub date: NaiveDate,
    /// The numeric payload.
    pub payload: Payload,
    /// Free-form tag naming where the record came from (e.g. "bmkg", "interpolated").
    pub source: String,
}

/// Numeric content of an [`Observation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A commodity price, usually per kilogram.
    Price { price: f64, unit: Option<String> },
    /// A weather reading.
    Weather(WeatherReading),
}

/// Daily weather values for one location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Air temperature in °C.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Precipitation in mm.
    pub rainfall: f64,
    /// Wind speed in km/h.
    pub wind_speed: f64,
}

/// Selects one numeric field of a [`Payload`] to build a series from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesField {
    #[default]
    Price,
    Temperature,
    Humidity,
    Rainfall,
    WindSpeed,
}

impl SeriesField {
    /// All weather fields, in the order they are interpolated.
    pub const WEATHER: [SeriesField; 4] = [
        SeriesField::Temperature,
        SeriesField::Humidity,
        SeriesField::Rainfall,
        SeriesField::WindSpeed,
    ];

    /// Returns the field's value, or `None` when the payload does not carry it.
    pub fn extract(self, payload: &Payload) -> Option<f64> {
        match (self, payload) {
            (SeriesField::Price, Payload::Price { price, .. }) => Some(*price),
            (SeriesField::Price, Payload::Weather(_)) => None,
            (_, Payload::Price { .. }) => None,
            (field, Payload::Weather(reading)) => reading.get(field),
        }
    }
}

impl fmt::Display for SeriesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesField::Price => "price",
            SeriesField::Temperature => "temperature",
            SeriesField::Humidity => "humidity",
            SeriesField::Rainfall => "rainfall",
            SeriesField::WindSpeed => "wind_speed",
        };
        f.write_str(name)
    }
}

impl WeatherReading {
    pub fn get(&self, field: SeriesField) -> Option<f64> {
        match field {
            SeriesField::Temperature => Some(self.temperature),
            SeriesField::Humidity => Some(self.humidity),
            SeriesField::Rainfall => Some(self.rainfall),
            SeriesField::WindSpeed => Some(self.wind_speed),
            SeriesField::Price => None,
        }
    }

    pub(crate) fn set(&mut self, field: SeriesField, value: f64) {
        match field {
            SeriesField::Temperature => self.temperature = value,
            SeriesField::Humidity => self.humidity = value,
            SeriesField::Rainfall => self.rainfall = value,
            SeriesField::WindSpeed => self.wind_speed = value,
            SeriesField::Price => {}
        }
    }
}

/// Natural key of an observation. At most one stored observation exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    pub entity: String,
    pub location: String,
    pub date: NaiveDate,
}

impl ObservationKey {
    pub fn new(entity: &str, location: &str, date: NaiveDate) -> Self {
        Self {
            entity: entity.trim().to_string(),
            location: location.trim().to_string(),
            date,
        }
    }
}

impl Observation {
    pub fn price(
        entity: &str,
        location: &str,
        date: NaiveDate,
        price: f64,
        source: &str,
    ) -> Self {
        Self {
            entity: entity.trim().to_string(),
            location: location.trim().to_string(),
            date,
            payload: Payload::Price { price, unit: None },
            source: source.to_string(),
        }
    }

    /// Weather observation; the entity is the location name.
    pub fn weather(location: &str, date: NaiveDate, reading: WeatherReading, source: &str) -> Self {
        Self {
            entity: location.trim().to_string(),
            location: location.trim().to_string(),
            date,
            payload: Payload::Weather(reading),
            source: source.to_string(),
        }
    }

    pub fn key(&self) -> ObservationKey {
        ObservationKey::new(&self.entity, &self.location, self.date)
    }

    pub fn value(&self, field: SeriesField) -> Option<f64> {
        field.extract(&self.payload)
    }

    pub fn weather_reading(&self) -> Option<&WeatherReading> {
        match &self.payload {
            Payload::Weather(reading) => Some(reading),
            Payload::Price { .. } => None,
        }
    }
}
