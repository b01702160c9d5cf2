//! Weather-specific error types.

use thiserror::Error;
use wxdash_core::{AppError, ConfigError, DatabaseError, NetworkError, ReqwestErrorExt};

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Weather API key is not configured")]
    MissingApiKey,

    /// Non-success response carrying the provider's own message.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Failed to fetch weather data (HTTP {0})")]
    FetchFailed(u16),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        WeatherError::Network(e.into_network_error())
    }
}

impl WeatherError {
    /// Upstream rejected the credential
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::MissingApiKey | Self::Upstream { status: 401, .. })
    }
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::MissingApiKey => {
                AppError::Config(ConfigError::MissingSetting("weather.api_key".to_string()))
            }
            WeatherError::Network(n) => AppError::Network(n),
            WeatherError::Storage(d) => AppError::Database(d),
            WeatherError::Upstream { status, message } => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            other => AppError::Service(other.to_string()),
        }
    }
}
