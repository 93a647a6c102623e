//! Records as they arrive from an external feed, before validation.

use crate::types::observation::{Observation, Payload, SeriesField, WeatherReading};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_SOURCE: &str = "external";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A number that may have been sent as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            RawNumber::Number(n) => *n,
            RawNumber::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for RawNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawNumber::Number(n) => write!(f, "{}", n),
            RawNumber::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Any JSON scalar. Values of other shapes are kept as `Other` and read as missing.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => Some(s),
        Scalar::Number(n) => Some(n.to_string()),
        Scalar::Other(_) => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RawNumber>, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Number(n) => Some(RawNumber::Number(n)),
        Scalar::Text(s) => Some(RawNumber::Text(s)),
        Scalar::Other(_) => None,
    })
}

/// An unvalidated price or weather record. Field names of the regional market feed
/// (`komoditas`, `pasar`, `tanggal`, `harga`, `satuan`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        alias = "komoditas",
        alias = "commodity",
        alias = "commodity_name"
    )]
    pub entity: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        alias = "pasar",
        alias = "market",
        alias = "market_location",
        alias = "location_name"
    )]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", alias = "tanggal")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", alias = "harga")]
    pub price: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient_text", alias = "satuan")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub humidity: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rainfall: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wind_speed: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: Option<String>,
}

/// A value replaced by a default while normalizing a [`RawRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    MissingEntity,
    MissingLocation,
    Date(Option<String>),
    Number {
        field: SeriesField,
        raw: Option<RawNumber>,
    },
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coercion::MissingEntity => write!(f, "missing entity, using '{}'", UNKNOWN),
            Coercion::MissingLocation => write!(f, "missing location, using '{}'", UNKNOWN),
            Coercion::Date(Some(raw)) => write!(f, "malformed date {:?}, using today", raw),
            Coercion::Date(None) => write!(f, "missing date, using today"),
            Coercion::Number {
                field,
                raw: Some(raw),
            } => write!(f, "malformed {} {}, using 0", field, raw),
            Coercion::Number { field, raw: None } => write!(f, "missing {}, using 0", field),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

impl RawRecord {
    pub fn price(entity: &str, location: &str, date: &str, price: f64) -> Self {
        Self {
            entity: Some(entity.to_string()),
            location: Some(location.to_string()),
            date: Some(date.to_string()),
            price: Some(RawNumber::Number(price)),
            ..Default::default()
        }
    }

    /// Carries weather fields and no price.
    pub fn is_weather(&self) -> bool {
        self.price.is_none()
            && [
                &self.temperature,
                &self.humidity,
                &self.rainfall,
                &self.wind_speed,
            ]
            .iter()
            .any(|v| v.is_some())
    }

    fn weather_field(&self, field: SeriesField) -> &Option<RawNumber> {
        match field {
            SeriesField::Temperature => &self.temperature,
            SeriesField::Humidity => &self.humidity,
            SeriesField::Rainfall => &self.rainfall,
            SeriesField::WindSpeed => &self.wind_speed,
            SeriesField::Price => &self.price,
        }
    }

    /// Builds an observation, replacing unusable values with defaults: numbers with
    /// 0.0, the date with `today`, names with `"unknown"`. Weather records without an
    /// entity use their location.
    pub fn normalize(&self, today: NaiveDate) -> (Observation, Vec<Coercion>) {
        let mut coercions = Vec::new();

        let date = match non_blank(&self.date) {
            Some(raw) => parse_date(raw).unwrap_or_else(|| {
                coercions.push(Coercion::Date(Some(raw.to_string())));
                today
            }),
            None => {
                coercions.push(Coercion::Date(None));
                today
            }
        };

        let location = non_blank(&self.location).unwrap_or_else(|| {
            coercions.push(Coercion::MissingLocation);
            UNKNOWN
        });

        let weather = self.is_weather();
        let entity = match non_blank(&self.entity) {
            Some(entity) => entity,
            None if weather => location,
            None => {
                coercions.push(Coercion::MissingEntity);
                UNKNOWN
            }
        };

        let mut number = |field: SeriesField| {
            let raw = self.weather_field(field);
            raw.as_ref().and_then(RawNumber::parse).unwrap_or_else(|| {
                coercions.push(Coercion::Number {
                    field,
                    raw: raw.clone(),
                });
                0.0
            })
        };

        let payload = if weather {
            let mut reading = WeatherReading::default();
            for field in SeriesField::WEATHER {
                reading.set(field, number(field));
            }
            Payload::Weather(reading)
        } else {
            Payload::Price {
                price: number(SeriesField::Price),
                unit: non_blank(&self.unit).map(str::to_string),
            }
        };

        let observation = Observation {
            entity: entity.to_string(),
            location: location.to_string(),
            date,
            payload,
            source: non_blank(&self.source).unwrap_or(DEFAULT_SOURCE).to_string(),
        };
        (observation, coercions)
    }
}
