//! Defines the `WeatherCondition` and `RiskLevel` labels and the ordered rule tables
//! that derive them from a [`WeatherReading`].

use crate::types::observation::WeatherReading;
use serde::{Deserialize, Serialize};

/// Rainfall (mm) above which a day counts as heavy rain.
pub const HEAVY_RAIN_MM: f64 = 15.0;
/// Rainfall (mm) above which a day counts as light rain.
pub const LIGHT_RAIN_MM: f64 = 5.0;
/// Temperature (°C) above which a dry day counts as sunny.
pub const WARM_DAY_C: f64 = 20.0;

/// A labelled predicate. Tables of rules are evaluated top-down and the first
/// matching rule wins.
#[derive(Debug, Clone, Copy)]
pub struct Rule<L> {
    pub label: L,
    pub applies: fn(&WeatherReading) -> bool,
}

/// Returns the label of the first rule in `rules` that applies to `reading`.
pub fn classify<L: Copy>(rules: &[Rule<L>], reading: &WeatherReading) -> Option<L> {
    rules
        .iter()
        .find(|rule| (rule.applies)(reading))
        .map(|rule| rule.label)
}

fn heavy_rain(r: &WeatherReading) -> bool {
    r.rainfall > HEAVY_RAIN_MM
}

fn light_rain(r: &WeatherReading) -> bool {
    r.rainfall > LIGHT_RAIN_MM
}

fn warm(r: &WeatherReading) -> bool {
    r.temperature > WARM_DAY_C
}

fn always(_: &WeatherReading) -> bool {
    true
}

/// Overall sky/precipitation condition of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    /// More than 15 mm of rain.
    HeavyRain,
    /// More than 5 mm of rain.
    LightRain,
    /// Dry and warmer than 20 °C.
    Sunny,
    /// Dry and 20 °C or colder.
    Cold,
}

/// Agricultural weather risk of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

pub const CONDITION_RULES: &[Rule<WeatherCondition>] = &[
    Rule {
        label: WeatherCondition::HeavyRain,
        applies: heavy_rain,
    },
    Rule {
        label: WeatherCondition::LightRain,
        applies: light_rain,
    },
    Rule {
        label: WeatherCondition::Sunny,
        applies: warm,
    },
    Rule {
        label: WeatherCondition::Cold,
        applies: always,
    },
];

pub const RISK_RULES: &[Rule<RiskLevel>] = &[
    Rule {
        label: RiskLevel::High,
        applies: heavy_rain,
    },
    Rule {
        label: RiskLevel::Medium,
        applies: light_rain,
    },
    Rule {
        label: RiskLevel::Low,
        applies: always,
    },
];

impl WeatherCondition {
    /// Classifies a reading with [`CONDITION_RULES`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use agrocast::{WeatherCondition, WeatherReading};
    ///
    /// let reading = WeatherReading { temperature: 24.0, rainfall: 16.0, ..Default::default() };
    /// assert_eq!(WeatherCondition::from_reading(&reading), WeatherCondition::HeavyRain);
    /// ```
    pub fn from_reading(reading: &WeatherReading) -> Self {
        classify(CONDITION_RULES, reading).unwrap_or(WeatherCondition::Cold)
    }
}

impl RiskLevel {
    /// Classifies a reading with [`RISK_RULES`].
    pub fn from_reading(reading: &WeatherReading) -> Self {
        classify(RISK_RULES, reading).unwrap_or(RiskLevel::Low)
    }
}
