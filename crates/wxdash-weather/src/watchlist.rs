//! Ordered watchlist with per-city fetch state.
//!
//! Each entry carries its own [`CityState`], so the weather cache and the
//! loading set are views over the list rather than separate maps. Removing
//! an entry removes everything known about that city in one step.

use tokio_util::sync::CancellationToken;

use crate::types::{CityKey, CityRecord, WeatherRecord};

/// Fetch state of one watchlist entry
#[derive(Debug, Clone, PartialEq)]
pub enum CityState {
    /// No data and nothing in flight
    Idle,
    /// A fetch tagged with `generation` is in flight
    Loading { generation: u64 },
    Loaded(WeatherRecord),
    /// Last fetch failed; the card keeps its placeholder until refresh or removal
    Failed,
}

#[derive(Debug)]
pub struct WatchEntry {
    pub city: CityRecord,
    pub state: CityState,
    cancel: CancellationToken,
}

impl WatchEntry {
    fn new(city: CityRecord) -> Self {
        Self {
            city,
            state: CityState::Idle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> CityKey {
        self.city.key()
    }

    /// Abort whatever is in flight for this entry and arm a fresh token.
    fn reset_token(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }
}

/// A fetch the caller must run and report back through [`Watchlist::complete`].
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub key: CityKey,
    pub city: CityRecord,
    pub generation: u64,
    /// Cancelled when the entry is removed or refreshed
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct Watchlist {
    entries: Vec<WatchEntry>,
    next_generation: u64,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted cities, dropping later duplicates.
    pub fn from_cities(cities: impl IntoIterator<Item = CityRecord>) -> Self {
        let mut list = Self::new();
        for city in cities {
            if !list.add(city.clone()) {
                tracing::warn!("Ignoring duplicate saved city {}", city.key());
            }
        }
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn cities(&self) -> Vec<CityRecord> {
        self.entries.iter().map(|e| e.city.clone()).collect()
    }

    fn position(&self, key: &CityKey) -> Option<usize> {
        self.entries.iter().position(|e| e.city.same_city(key))
    }

    pub fn contains(&self, key: &CityKey) -> bool {
        self.position(key).is_some()
    }

    pub fn state(&self, key: &CityKey) -> Option<&CityState> {
        self.position(key).map(|i| &self.entries[i].state)
    }

    /// Cached weather for `key`, if its last fetch succeeded
    pub fn weather(&self, key: &CityKey) -> Option<&WeatherRecord> {
        match self.state(key) {
            Some(CityState::Loaded(record)) => Some(record),
            _ => None,
        }
    }

    pub fn is_loading(&self, key: &CityKey) -> bool {
        matches!(self.state(key), Some(CityState::Loading { .. }))
    }

    /// Append `city`. Returns false, leaving the list untouched, if it is already present.
    pub fn add(&mut self, city: CityRecord) -> bool {
        if self.contains(&city.key()) {
            return false;
        }
        self.entries.push(WatchEntry::new(city));
        true
    }

    /// Remove `key` and cancel its in-flight fetch, if any.
    pub fn remove(&mut self, key: &CityKey) -> Option<CityRecord> {
        let index = self.position(key)?;
        let entry = self.entries.remove(index);
        entry.cancel.cancel();
        Some(entry.city)
    }

    /// Drop every cached record and cancel every in-flight fetch. Entries stay.
    pub fn clear_weather(&mut self) {
        for entry in &mut self.entries {
            entry.reset_token();
            entry.state = CityState::Idle;
        }
    }

    /// Move every idle entry to loading and hand out one ticket per entry.
    ///
    /// Failed entries are left alone; only a refresh or re-add retries them.
    pub fn begin_missing(&mut self) -> Vec<FetchTicket> {
        let mut tickets = Vec::new();
        for entry in &mut self.entries {
            if entry.state != CityState::Idle {
                continue;
            }
            self.next_generation += 1;
            let generation = self.next_generation;
            entry.state = CityState::Loading { generation };
            tickets.push(FetchTicket {
                key: entry.key(),
                city: entry.city.clone(),
                generation,
                cancel: entry.cancel.clone(),
            });
        }
        tickets
    }

    /// Apply a finished fetch. `None` records a failure.
    ///
    /// Returns false when the ticket is stale: the city was removed, or a
    /// newer fetch has superseded it.
    pub fn complete(
        &mut self,
        key: &CityKey,
        generation: u64,
        record: Option<WeatherRecord>,
    ) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if entry.state != (CityState::Loading { generation }) {
            return false;
        }
        entry.state = match record {
            Some(record) => CityState::Loaded(record),
            None => CityState::Failed,
        };
        true
    }
}
