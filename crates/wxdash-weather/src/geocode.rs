//! Forward geocoding: turn a typed place name into candidate cities.
//! Uses the OpenWeatherMap direct geocoding endpoint with the same API key.

use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::provider::OpenWeatherProvider;
use crate::types::CityRecord;

const GEOCODING_PATH: &str = "/geo/1.0/direct";

#[derive(Debug, Deserialize)]
struct GeoCandidate {
    name: String,
    #[serde(default)]
    country: Option<String>,
    lat: f64,
    lon: f64,
    #[serde(default)]
    state: Option<String>,
}

impl From<GeoCandidate> for CityRecord {
    fn from(c: GeoCandidate) -> Self {
        CityRecord {
            name: c.name,
            country: c.country.unwrap_or_default(),
            latitude: c.lat,
            longitude: c.lon,
            state: c.state,
        }
    }
}

impl OpenWeatherProvider {
    /// Look up cities matching `query`, in the upstream's ranking order.
    #[instrument(skip(self), level = "info")]
    pub async fn geocode(&self, query: &str) -> Result<Vec<CityRecord>, WeatherError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.base_url, GEOCODING_PATH);
        let limit = self.search_limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str()), ("appid", api_key)])
            .send()
            .await?;

        let candidates: Vec<GeoCandidate> = self.handle_response(response).await?;
        tracing::debug!("Geocoding '{}' returned {} candidates", query, candidates.len());

        Ok(candidates.into_iter().map(CityRecord::from).collect())
    }
}
