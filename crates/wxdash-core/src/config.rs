use anyhow::{Context, Result};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `weather.api_key`
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Prefix for layered environment overrides (e.g. `WXDASH_WEATHER__SEARCH_LIMIT`)
const ENV_PREFIX: &str = "WXDASH";

/// Upstream hard cap on geocoding candidates
pub const MAX_SEARCH_LIMIT: u32 = 5;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Temperature display unit. Celsius is the stored unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key. `OPENWEATHER_API_KEY` takes precedence.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL for both the geocoding and current-weather endpoints
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Maximum number of geocoding candidates per search
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Queries shorter than this never reach the network
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Quiet period before a typed query is searched
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// HTTP client timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Initial display unit
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

fn default_api_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_search_limit() -> u32 {
    MAX_SEARCH_LIMIT
}

fn default_min_query_len() -> usize {
    3
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            search_limit: default_search_limit(),
            min_query_len: default_min_query_len(),
            search_debounce_ms: default_search_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

impl WeatherConfig {
    /// API key with placeholders and blank values treated as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.starts_with("YOUR_"))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the persisted watchlist, relative to `config_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "wxdash.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wxdash");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    ///
    /// `WXDASH_*` environment variables are layered over the file, and
    /// `OPENWEATHER_API_KEY` overrides the API key last.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
        }

        let layered = ::config::Config::builder()
            .add_source(::config::File::from(path.to_path_buf()))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read config file")?;

        let mut config: Config = layered
            .try_deserialize()
            .context("Failed to parse config file")?;

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from {}", API_KEY_ENV);
                config.weather.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Load configuration from the default location and validate it.
    pub fn load_validated() -> std::result::Result<(Self, ValidationResult), ConfigError> {
        let path = Self::config_path().map_err(|e| ConfigError::Unreadable(format!("{:#}", e)))?;
        Self::load_validated_from(&path)
    }

    /// Load `path` and validate it.
    ///
    /// Warnings are logged and returned; any validation error fails the load.
    pub fn load_validated_from(
        path: &Path,
    ) -> std::result::Result<(Self, ValidationResult), ConfigError> {
        let config =
            Self::load_from(path).map_err(|e| ConfigError::Unreadable(format!("{:#}", e)))?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_base_url, "weather.api_base_url", &mut result);

        if self.weather.api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured - set {} to fetch weather", API_KEY_ENV),
            );
        }

        if self.weather.search_limit == 0 {
            result.add_error("weather.search_limit", "Search limit must be greater than 0");
        } else if self.weather.search_limit > MAX_SEARCH_LIMIT {
            result.add_warning(
                "weather.search_limit",
                format!("Upstream returns at most {} candidates", MAX_SEARCH_LIMIT),
            );
        }

        if self.weather.search_debounce_ms == 0 {
            result.add_warning(
                "weather.search_debounce_ms",
                "Search debounce disabled (0 ms) - every keystroke hits the network",
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name is empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Full path of the watchlist database
    pub fn database_path(&self) -> PathBuf {
        self.config_dir.join(&self.storage.database_file)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wxdash");

        Ok(config_dir.join("config.toml"))
    }
}
