use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use wxdash_core::TemperatureUnit;

/// Icon shown on a card that has no weather yet
pub const DEFAULT_ICON: &str = "01d";

/// Condition text shown on a card that has no weather yet
pub const PLACEHOLDER_CONDITION: &str = "Loading...";

/// Identity of a city: name plus country. Coordinates are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityKey {
    pub name: String,
    pub country: String,
}

impl CityKey {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
        }
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.country.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}, {}", self.name, self.country)
        }
    }
}

/// A city resolved by the geocoder, as stored on the watchlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    /// Region, when the geocoder reports one. Display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl CityRecord {
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            latitude,
            longitude,
            state: None,
        }
    }

    pub fn key(&self) -> CityKey {
        CityKey::new(self.name.clone(), self.country.clone())
    }

    /// True when both records name the same city, whatever their coordinates
    pub fn same_city(&self, key: &CityKey) -> bool {
        self.name == key.name && self.country == key.country
    }

    /// Label for suggestion lists, e.g. "Portland, Oregon, US"
    pub fn label(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => self.key().to_string(),
        }
    }
}

/// Current conditions for one city, in canonical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub country: String,
    /// Degrees Celsius, rounded
    pub temperature: i32,
    /// Short condition label, e.g. "Clouds"
    pub condition: String,
    /// Relative humidity in percent
    pub humidity: u8,
    /// km/h, rounded
    pub wind_speed: i32,
    /// Upstream icon code, e.g. "04d"
    pub icon: String,
    pub description: String,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn key(&self) -> CityKey {
        CityKey::new(self.city.clone(), self.country.clone())
    }
}

/// Convert a stored Celsius temperature for display.
pub fn convert_temperature(celsius: i32, unit: TemperatureUnit) -> i32 {
    match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => (f64::from(celsius) * 9.0 / 5.0 + 32.0).round() as i32,
    }
}

/// m/s as reported upstream, to whole km/h
pub fn wind_speed_kmh(meters_per_second: f64) -> i32 {
    (meters_per_second * 3.6).round() as i32
}
