//! Expiring key-value store with a tiered backend fallback.
//!
//! [`Store`] is the façade every caller goes through. It selects a
//! [`StoreBackend`] once, on first use: the SQLite-backed primary when it can
//! be opened, the flat in-process map otherwise. Expiration is lazy (checked
//! on read) and bounded by a periodic sweep ([`spawn_sweeper`]).

mod entry;
mod facade;
mod flat;
mod sweep;
mod weather;

pub use entry::{CacheEntry, now_ms};
pub use facade::{Store, StoreConfig};
pub use flat::FlatBackend;
pub use sweep::{SweepHandle, spawn_sweeper};
pub use weather::{
    FORECAST_PREFIX, LAST_LOCATION_KEY, LAST_LOCATION_TTL, Location, WEATHER_PREFIX, WEATHER_TTL, coordinate_key,
};

use crate::Error;
use crate::cache::CacheDb;

/// Which backend variant is serving the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    PrimaryDurable,
    SecondaryFlat,
}

/// The active storage backend, chosen once per store.
#[derive(Debug)]
pub enum StoreBackend {
    Primary(CacheDb),
    Secondary(FlatBackend),
}

impl StoreBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            StoreBackend::Primary(_) => BackendKind::PrimaryDurable,
            StoreBackend::Secondary(_) => BackendKind::SecondaryFlat,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        match self {
            StoreBackend::Primary(db) => db.get_entry(key).await,
            StoreBackend::Secondary(flat) => flat.get(key).await,
        }
    }

    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        match self {
            StoreBackend::Primary(db) => db.put_entry(entry).await,
            StoreBackend::Secondary(flat) => flat.put(entry).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        match self {
            StoreBackend::Primary(db) => db.delete_entry(key).await,
            StoreBackend::Secondary(flat) => flat.delete(key).await,
        }
    }

    pub async fn delete_if_unchanged(&self, entry: &CacheEntry) -> Result<bool, Error> {
        match self {
            StoreBackend::Primary(db) => db.delete_entry_if_unchanged(entry).await,
            StoreBackend::Secondary(flat) => flat.delete_if_unchanged(entry).await,
        }
    }

    pub async fn clear(&self) -> Result<(), Error> {
        match self {
            StoreBackend::Primary(db) => db.clear_entries().await,
            StoreBackend::Secondary(flat) => flat.clear().await,
        }
    }

    pub async fn purge_expired(&self, now_ms: i64) -> Result<u64, Error> {
        match self {
            StoreBackend::Primary(db) => db.purge_expired_entries(now_ms).await,
            StoreBackend::Secondary(flat) => flat.purge_expired(now_ms).await,
        }
    }
}
