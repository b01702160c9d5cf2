//! Dashboard controller: watchlist, per-city weather and city search.
//!
//! All state sits behind one lock that is never held across an await, so
//! every observer sees add/remove/refresh as a single step. Network calls run
//! as tokio tasks; each result is applied to its own city only.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use wxdash_core::WeatherConfig;

use crate::debounce::debounce;
use crate::provider::WeatherBackend;
use crate::store::WatchlistStore;
use crate::types::{
    convert_temperature, CityKey, CityRecord, TemperatureUnit, WeatherRecord, DEFAULT_ICON,
    PLACEHOLDER_CONDITION,
};
use crate::watchlist::{CityState, FetchTicket, Watchlist};

pub const SEARCH_FAILED_MESSAGE: &str = "Failed to search cities. Please try again.";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch weather data for some cities.";

/// How a single city fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Loaded,
    Failed,
    /// Removed, refreshed or superseded while in flight
    Discarded,
}

/// Point-in-time copy of everything the presentation layer renders
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub query: String,
    pub suggestions: Vec<CityRecord>,
    pub searching: bool,
    /// The last search for the current query matched nothing
    pub no_results: bool,
    pub cities: Vec<CityRecord>,
    pub error: Option<String>,
    pub unit: TemperatureUnit,
}

/// Render-ready card for one watchlist entry
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherCard {
    pub key: CityKey,
    pub loading: bool,
    /// False while the card shows placeholder values
    pub has_data: bool,
    /// In the dashboard's display unit
    pub temperature: i32,
    pub unit: TemperatureUnit,
    pub condition: String,
    pub description: String,
    pub humidity: u8,
    pub wind_speed: i32,
    pub icon: String,
}

impl WeatherCard {
    fn build(city: &CityRecord, state: &CityState, unit: TemperatureUnit) -> Self {
        match state {
            CityState::Loaded(record) => Self {
                key: city.key(),
                loading: false,
                has_data: true,
                temperature: convert_temperature(record.temperature, unit),
                unit,
                condition: record.condition.clone(),
                description: record.description.clone(),
                humidity: record.humidity,
                wind_speed: record.wind_speed,
                icon: record.icon.clone(),
            },
            other => Self {
                key: city.key(),
                loading: matches!(other, CityState::Loading { .. }),
                has_data: false,
                temperature: 0,
                unit,
                condition: PLACEHOLDER_CONDITION.to_string(),
                description: String::new(),
                humidity: 0,
                wind_speed: 0,
                icon: DEFAULT_ICON.to_string(),
            },
        }
    }
}

#[derive(Debug)]
struct DashboardState {
    watchlist: Watchlist,
    query: String,
    /// Bumped on every query change; late search results for an older query are dropped
    query_revision: u64,
    suggestions: Vec<CityRecord>,
    searching: bool,
    no_results: bool,
    error: Option<String>,
    unit: TemperatureUnit,
}

struct Inner<B> {
    backend: B,
    store: Arc<dyn WatchlistStore>,
    state: Mutex<DashboardState>,
    /// Serializes saves; taken before `state` and held across the store write
    persist_lock: Mutex<()>,
    query_tx: watch::Sender<String>,
    changes: watch::Sender<u64>,
    min_query_len: usize,
    debounce_delay: Duration,
}

/// Watchlist weather dashboard.
///
/// Cheap to clone; clones share state.
pub struct Dashboard<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for Dashboard<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: WeatherBackend> Dashboard<B> {
    /// Create the dashboard and restore the persisted watchlist.
    ///
    /// An unreadable store is logged and treated as an empty watchlist.
    /// No weather is fetched until [`Dashboard::load_missing`] or
    /// [`Dashboard::refresh`] runs.
    pub fn new(backend: B, store: Arc<dyn WatchlistStore>, config: &WeatherConfig) -> Self {
        let saved = match store.load() {
            Ok(cities) => cities,
            Err(e) => {
                tracing::warn!("Could not restore watchlist, starting empty: {}", e);
                Vec::new()
            }
        };
        let watchlist = Watchlist::from_cities(saved);
        tracing::info!("Dashboard restored {} cities", watchlist.len());

        let (query_tx, _) = watch::channel(String::new());
        let (changes, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                state: Mutex::new(DashboardState {
                    watchlist,
                    query: String::new(),
                    query_revision: 0,
                    suggestions: Vec::new(),
                    searching: false,
                    no_results: false,
                    error: None,
                    unit: config.temperature_unit,
                }),
                persist_lock: Mutex::new(()),
                query_tx,
                changes,
                min_query_len: config.min_query_len,
                debounce_delay: config.search_debounce(),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Receiver that changes whenever anything visible changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Save the watchlist as it is now, outside the state lock.
    ///
    /// The list is read after taking `persist_lock`, so the last save to run
    /// always writes the newest list.
    fn persist(&self) {
        let _writer = self.inner.persist_lock.lock();
        let cities = self.inner.state.lock().watchlist.cities();
        if let Err(e) = self.inner.store.save(&cities) {
            tracing::warn!("Failed to persist watchlist: {}", e);
        }
    }

    // ---- watchlist ---------------------------------------------------------

    /// Add `city` and fetch its weather.
    ///
    /// Returns false without doing anything else if the city is already on the
    /// watchlist. Otherwise the city is appended, the search box is cleared,
    /// the watchlist is saved, and missing weather is loaded before returning.
    pub async fn add_city(&self, city: CityRecord) -> bool {
        let key = city.key();
        {
            let mut state = self.inner.state.lock();
            if !state.watchlist.add(city) {
                tracing::debug!("{} is already on the watchlist", key);
                return false;
            }
            state.query.clear();
            state.query_revision += 1;
            state.suggestions.clear();
            state.searching = false;
            state.no_results = false;
        }
        self.persist();
        self.inner.query_tx.send_replace(String::new());
        tracing::info!("Added {} to watchlist", key);
        self.notify();

        self.load_missing().await;
        true
    }

    /// Remove `key` together with its cached weather and any in-flight fetch.
    ///
    /// Returns false if the city was not on the watchlist.
    pub fn remove_city(&self, key: &CityKey) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.watchlist.remove(key).is_none() {
                return false;
            }
        }
        self.persist();
        tracing::info!("Removed {} from watchlist", key);
        self.notify();
        true
    }

    /// Drop all cached weather and fetch every city again, concurrently.
    pub async fn refresh(&self) {
        {
            let mut state = self.inner.state.lock();
            state.watchlist.clear_weather();
            tracing::info!("Refreshing weather for {} cities", state.watchlist.len());
        }
        self.notify();
        self.load_missing().await;
    }

    /// Fetch weather for every city that has neither data nor a fetch in flight.
    ///
    /// Fetches run concurrently and are awaited together. Returns how many
    /// fetches were started. Any failure sets one aggregate error message.
    pub async fn load_missing(&self) -> usize {
        let tickets = self.inner.state.lock().watchlist.begin_missing();
        let started = tickets.len();
        if started == 0 {
            return 0;
        }
        self.notify();

        let mut tasks = JoinSet::new();
        for ticket in tickets {
            let dashboard = self.clone();
            tasks.spawn(async move { dashboard.run_fetch(ticket).await });
        }

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FetchOutcome::Failed) => failed += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Weather fetch task aborted: {}", e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            tracing::warn!("{} of {} weather fetches failed", failed, started);
            self.inner.state.lock().error = Some(FETCH_FAILED_MESSAGE.to_string());
            self.notify();
        }
        started
    }

    async fn run_fetch(&self, ticket: FetchTicket) -> FetchOutcome {
        let result = tokio::select! {
            _ = ticket.cancel.cancelled() => {
                tracing::debug!("Fetch for {} cancelled", ticket.key);
                return FetchOutcome::Discarded;
            }
            result = self.inner.backend.current_weather(&ticket.city) => result,
        };

        let (record, outcome) = match result {
            Ok(record) => (Some(record), FetchOutcome::Loaded),
            Err(e) if e.is_auth_failure() => {
                tracing::error!(
                    "Weather fetch for {} rejected, check the API key: {}",
                    ticket.key,
                    e
                );
                (None, FetchOutcome::Failed)
            }
            Err(e) => {
                tracing::warn!("Weather fetch for {} failed: {}", ticket.key, e);
                (None, FetchOutcome::Failed)
            }
        };

        let applied = self
            .inner
            .state
            .lock()
            .watchlist
            .complete(&ticket.key, ticket.generation, record);
        if !applied {
            tracing::debug!("Discarding stale weather for {}", ticket.key);
            return FetchOutcome::Discarded;
        }
        self.notify();
        outcome
    }

    // ---- search ------------------------------------------------------------

    /// Record what the user typed and feed it to the debounced search.
    ///
    /// Queries too short to search hide the suggestions immediately.
    pub fn set_query(&self, query: &str) {
        {
            let mut state = self.inner.state.lock();
            state.query = query.to_string();
            state.query_revision += 1;
            state.no_results = false;
            if query.trim().chars().count() < self.inner.min_query_len {
                state.suggestions.clear();
                state.searching = false;
            }
        }
        self.inner.query_tx.send_replace(query.to_string());
        self.notify();
    }

    /// Run debounced queries through [`Dashboard::search`] until the handle is aborted.
    pub fn spawn_search_worker(&self) -> JoinHandle<()> {
        let mut queries = debounce(self.inner.query_tx.subscribe(), self.inner.debounce_delay);
        let dashboard = self.clone();
        tokio::spawn(async move {
            while queries.changed().await.is_ok() {
                let query = queries.borrow_and_update().clone();
                dashboard.search(&query).await;
            }
        })
    }

    /// Resolve `query` to suggestions.
    ///
    /// Short queries return nothing without touching the network. Failures are
    /// swallowed here: the suggestions are emptied and an error message is set.
    /// Cities already on the watchlist are left out. If the query changed
    /// while the request was out, the outcome is returned but not shown.
    pub async fn search(&self, query: &str) -> Vec<CityRecord> {
        let query = query.trim();
        let revision = {
            let mut state = self.inner.state.lock();
            if query.chars().count() < self.inner.min_query_len {
                state.suggestions.clear();
                state.searching = false;
                state.no_results = false;
                drop(state);
                self.notify();
                return Vec::new();
            }
            state.searching = true;
            state.query_revision
        };
        self.notify();

        let result = self.inner.backend.search_cities(query).await;
        if let Err(e) = &result {
            tracing::warn!("City search for '{}' failed: {}", query, e);
        }

        let mut state = self.inner.state.lock();
        let found = match &result {
            Ok(cities) => cities
                .iter()
                .filter(|c| !state.watchlist.contains(&c.key()))
                .cloned()
                .collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        if state.query_revision != revision {
            tracing::debug!("Dropping results for superseded query '{}'", query);
            return found;
        }

        state.searching = false;
        state.no_results = result.is_ok() && found.is_empty();
        if result.is_err() {
            state.error = Some(SEARCH_FAILED_MESSAGE.to_string());
        }
        state.suggestions = found.clone();
        drop(state);
        self.notify();
        found
    }

    // ---- display -----------------------------------------------------------

    pub fn set_unit(&self, unit: TemperatureUnit) {
        self.inner.state.lock().unit = unit;
        self.notify();
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.inner.state.lock().unit
    }

    pub fn dismiss_error(&self) {
        self.inner.state.lock().error = None;
        self.notify();
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    pub fn contains(&self, key: &CityKey) -> bool {
        self.inner.state.lock().watchlist.contains(key)
    }

    pub fn cities(&self) -> Vec<CityRecord> {
        self.inner.state.lock().watchlist.cities()
    }

    /// Cached weather for `key`, in Celsius
    pub fn weather(&self, key: &CityKey) -> Option<WeatherRecord> {
        self.inner.state.lock().watchlist.weather(key).cloned()
    }

    pub fn is_loading(&self, key: &CityKey) -> bool {
        self.inner.state.lock().watchlist.is_loading(key)
    }

    pub fn city_state(&self, key: &CityKey) -> Option<CityState> {
        self.inner.state.lock().watchlist.state(key).cloned()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.inner.state.lock();
        DashboardSnapshot {
            query: state.query.clone(),
            suggestions: state.suggestions.clone(),
            searching: state.searching,
            no_results: state.no_results,
            cities: state.watchlist.cities(),
            error: state.error.clone(),
            unit: state.unit,
        }
    }

    /// One card per watchlist entry, in watchlist order.
    pub fn cards(&self) -> Vec<WeatherCard> {
        let state = self.inner.state.lock();
        state
            .watchlist
            .entries()
            .iter()
            .map(|entry| WeatherCard::build(&entry.city, &entry.state, state.unit))
            .collect()
    }
}
