//! Error types shared by the wxdash crates.
//!
//! Anything that stops the terminal front end ends up as an [`AppError`].
//! `Display` carries the detail for the log; `user_message()` is the line
//! printed to the user.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("storage: {0}")]
    Database(#[from] DatabaseError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Weather service failures without a more specific category.
    #[error("weather service: {0}")]
    Service(String),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "Lost the terminal. Restart wxdash.",
            AppError::Service(_) => "The weather service could not be used. Please try again.",
        }
    }
}

/// HTTP and connectivity failures.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("unreadable response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Cannot reach the weather service. Check your internet connection."
            }
            NetworkError::Timeout => "The weather service took too long to answer.",
            NetworkError::ServerError { status: 401, .. } => {
                "The weather service rejected the API key. Check OPENWEATHER_API_KEY."
            }
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Try again later."
            }
            NetworkError::ServerError { .. } => "The weather service refused the request.",
            NetworkError::InvalidResponse(_) => "The weather service sent something unexpected.",
        }
    }
}

/// Watchlist persistence failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("stored data is corrupt: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => {
                "Cannot open the saved watchlist. Check storage.database_file."
            }
            DatabaseError::QueryFailed(_) => "Reading or saving the watchlist failed.",
            DatabaseError::Corruption(_) => "The saved watchlist is damaged and was ignored.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file (or environment layer) could not be read or parsed.
    #[error("cannot load configuration: {0}")]
    Unreadable(String),

    /// Loaded, but validation reported errors.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Unreadable(_) => "Could not read config.toml. Fix or delete it.",
            ConfigError::Invalid(_) => "config.toml has invalid settings. See the log for details.",
            ConfigError::MissingSetting(_) => {
                "A required setting is missing. Set OPENWEATHER_API_KEY or weather.api_key."
            }
        }
    }
}

/// Classify a reqwest failure.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        if self.is_decode() {
            return NetworkError::InvalidResponse(self.to_string());
        }
        match self.status() {
            Some(status) => NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            },
            None => NetworkError::ConnectionFailed(self.to_string()),
        }
    }
}

/// Classify a rusqlite failure.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
