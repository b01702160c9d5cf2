//! Weather dashboard for wxdash
//!
//! City search and current conditions via OpenWeatherMap, a persisted
//! watchlist, and the controller tying them together.

pub mod dashboard;
pub mod debounce;
pub mod error;
pub mod geocode;
pub mod provider;
pub mod store;
pub mod types;
pub mod watchlist;

pub use dashboard::{
    Dashboard, DashboardSnapshot, WeatherCard, FETCH_FAILED_MESSAGE, SEARCH_FAILED_MESSAGE,
};
pub use debounce::debounce;
pub use error::WeatherError;
pub use provider::{OpenWeatherProvider, WeatherBackend};
pub use store::{MemoryWatchlistStore, SqliteWatchlistStore, WatchlistStore, WATCHLIST_KEY};
pub use types::*;
pub use watchlist::{CityState, Watchlist};
