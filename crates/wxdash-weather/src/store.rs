//! Watchlist persistence.
//!
//! The dashboard reads the watchlist once when it is created and writes the
//! whole list back after every add/remove. Storage is a single JSON array of
//! [`CityRecord`] under the key [`WATCHLIST_KEY`].

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use wxdash_core::{DatabaseError, RusqliteErrorExt};

use crate::error::WeatherError;
use crate::types::CityRecord;

/// Fixed storage key for the watchlist blob
pub const WATCHLIST_KEY: &str = "weatherCities";

/// Persistence port for the watchlist.
pub trait WatchlistStore: Send + Sync {
    /// Read the persisted watchlist. A store that was never written yields an empty list.
    fn load(&self) -> Result<Vec<CityRecord>, WeatherError>;

    /// Replace the persisted watchlist.
    fn save(&self, cities: &[CityRecord]) -> Result<(), WeatherError>;
}

fn encode(cities: &[CityRecord]) -> Result<String, WeatherError> {
    serde_json::to_string(cities).map_err(|e| WeatherError::Parse(e.to_string()))
}

fn decode(raw: &str) -> Result<Vec<CityRecord>, WeatherError> {
    serde_json::from_str(raw)
        .map_err(|e| WeatherError::Storage(DatabaseError::Corruption(e.to_string())))
}

/// SQLite-backed key-value store holding the watchlist.
pub struct SqliteWatchlistStore {
    conn: Mutex<Connection>,
}

impl SqliteWatchlistStore {
    /// Open or create the database, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, WeatherError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_database_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, WeatherError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_database_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, WeatherError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(RusqliteErrorExt::into_database_error)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, WeatherError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(value)
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(())
    }
}

impl WatchlistStore for SqliteWatchlistStore {
    fn load(&self) -> Result<Vec<CityRecord>, WeatherError> {
        match self.get_raw(WATCHLIST_KEY)? {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, cities: &[CityRecord]) -> Result<(), WeatherError> {
        let raw = encode(cities)?;
        self.put_raw(WATCHLIST_KEY, &raw)?;
        tracing::debug!("Persisted {} watchlist cities", cities.len());
        Ok(())
    }
}

/// Process-local store. Keeps the serialized blob so it behaves like the
/// durable store, including corrupt-data handling.
#[derive(Default)]
pub struct MemoryWatchlistStore {
    raw: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cities(cities: &[CityRecord]) -> Result<Self, WeatherError> {
        let store = Self::new();
        *store.raw.lock() = Some(encode(cities)?);
        Ok(store)
    }

    /// Seed the store with an arbitrary blob.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *store.raw.lock() = Some(raw.into());
        store
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl WatchlistStore for MemoryWatchlistStore {
    fn load(&self) -> Result<Vec<CityRecord>, WeatherError> {
        match self.raw.lock().as_deref() {
            Some(raw) => decode(raw),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, cities: &[CityRecord]) -> Result<(), WeatherError> {
        let raw = encode(cities)?;
        *self.raw.lock() = Some(raw);
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cities() -> Vec<CityRecord> {
        vec![
            CityRecord::new("London", "GB", 51.5073, -0.1276),
            CityRecord::new("Tokyo", "JP", 35.6828, 139.759),
        ]
    }

    #[test]
    fn test_sqlite_empty_store_loads_empty() {
        let store = SqliteWatchlistStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("wxdash.db");

        {
            let store = SqliteWatchlistStore::open(&path).unwrap();
            store.save(&cities()).unwrap();
        }

        let store = SqliteWatchlistStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), cities());
    }

    #[test]
    fn test_sqlite_save_overwrites() {
        let store = SqliteWatchlistStore::in_memory().unwrap();
        store.save(&cities()).unwrap();
        store.save(&cities()[1..]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Tokyo");
    }

    #[test]
    fn test_sqlite_corrupt_blob_is_reported() {
        let store = SqliteWatchlistStore::in_memory().unwrap();
        store.put_raw(WATCHLIST_KEY, "{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Storage(DatabaseError::Corruption(_))
        ));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryWatchlistStore::with_cities(&cities()).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
        assert_eq!(store.save_count(), 0);

        store.save(&[]).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.load().unwrap().is_empty());
    }
}
