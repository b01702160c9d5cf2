//! OpenWeatherMap client: current conditions by coordinates.
//! City search lives in [`crate::geocode`].

use chrono::Utc;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use tracing::instrument;

use wxdash_core::WeatherConfig;

use crate::error::WeatherError;
use crate::types::{wind_speed_kmh, CityRecord, WeatherRecord, DEFAULT_ICON};

const USER_AGENT: &str = concat!("wxdash/", env!("CARGO_PKG_VERSION"));
const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// Upstream the dashboard talks to. Implemented by [`OpenWeatherProvider`];
/// tests substitute their own.
pub trait WeatherBackend: Send + Sync + 'static {
    /// Resolve free text to candidate cities, most relevant first.
    fn search_cities(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CityRecord>, WeatherError>> + Send;

    /// Current conditions at the city's coordinates.
    fn current_weather(
        &self,
        city: &CityRecord,
    ) -> impl Future<Output = Result<WeatherRecord, WeatherError>> + Send;
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: MainBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    wind: WindBlock,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl CurrentResponse {
    fn into_record(self, city: &CityRecord) -> WeatherRecord {
        let (condition, description, icon) = match self.weather.into_iter().next() {
            Some(c) => (c.main, c.description, c.icon),
            None => (String::new(), String::new(), DEFAULT_ICON.to_string()),
        };

        WeatherRecord {
            city: city.name.clone(),
            country: city.country.clone(),
            temperature: self.main.temp.round() as i32,
            condition,
            humidity: self.main.humidity.round().clamp(0.0, 100.0) as u8,
            wind_speed: wind_speed_kmh(self.wind.speed),
            icon,
            description,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    api_key: Option<String>,
    pub(crate) search_limit: u32,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key().map(str::to_string),
            search_limit: config.search_limit,
        })
    }

    /// Credential for a request. Absence is fatal for every call.
    pub(crate) fn api_key(&self) -> Result<&str, WeatherError> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => {
                tracing::error!("OpenWeatherMap API key is not configured");
                Err(WeatherError::MissingApiKey)
            }
        }
    }

    /// Fetch current conditions for `city` in metric units.
    #[instrument(skip(self, city), fields(city = %city.key()), level = "info")]
    pub async fn fetch_current(&self, city: &CityRecord) -> Result<WeatherRecord, WeatherError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.base_url, CURRENT_WEATHER_PATH);
        let lat = city.latitude.to_string();
        let lon = city.longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", "metric"),
                ("appid", api_key),
            ])
            .send()
            .await?;

        let body: CurrentResponse = self.handle_response(response).await?;
        let record = body.into_record(city);
        tracing::debug!(
            "Fetched weather for {}: {}°C {}",
            city.key(),
            record.temperature,
            record.condition
        );
        Ok(record)
    }

    /// Decode a success body, or turn a failure into the upstream's own message.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.trim().is_empty());
            tracing::warn!("Weather API returned {}: {:?}", status, message);
            return Err(match message {
                Some(message) => WeatherError::Upstream {
                    status: status.as_u16(),
                    message,
                },
                None => WeatherError::FetchFailed(status.as_u16()),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("Failed to parse weather API response: {}", e);
            WeatherError::Parse(e.to_string())
        })
    }
}

impl WeatherBackend for OpenWeatherProvider {
    async fn search_cities(&self, query: &str) -> Result<Vec<CityRecord>, WeatherError> {
        self.geocode(query).await
    }

    async fn current_weather(&self, city: &CityRecord) -> Result<WeatherRecord, WeatherError> {
        self.fetch_current(city).await
    }
}
