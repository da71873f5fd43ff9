//! The store façade: one async get/set/remove/clear API over whichever
//! backend is active.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{BackendKind, CacheEntry, FlatBackend, StoreBackend, now_ms};
use crate::Error;
use crate::cache::CacheDb;
use crate::config::AppConfig;

/// Construction parameters for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite file for the durable backend. `None` disables it.
    pub db_path: Option<PathBuf>,
    /// TTL applied when `set` is called without one.
    pub default_ttl: Duration,
}

impl From<&AppConfig> for StoreConfig {
    fn from(config: &AppConfig) -> Self {
        Self { db_path: config.durable_store.then(|| config.db_path.clone()), default_ttl: config.default_ttl() }
    }
}

/// Expiring key-value store.
///
/// Backend selection happens once, on first use, and concurrent first
/// callers share that single initialization. A closed durable connection
/// demotes the store to a fresh flat backend for the rest of its life.
///
/// Create one per process and share it (e.g. behind an `Arc`).
#[derive(Debug)]
pub struct Store {
    db_path: Option<PathBuf>,
    default_ttl: Duration,
    selected: OnceCell<Arc<StoreBackend>>,
    demoted: OnceCell<Arc<StoreBackend>>,
}

impl Store {
    /// Create a store whose backend is selected lazily.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            db_path: config.db_path,
            default_ttl: config.default_ttl,
            selected: OnceCell::new(),
            demoted: OnceCell::new(),
        }
    }

    /// Create a store over an already-selected backend.
    pub fn with_backend(backend: StoreBackend, default_ttl: Duration) -> Self {
        Self { db_path: None, default_ttl, selected: OnceCell::from(Arc::new(backend)), demoted: OnceCell::new() }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// The active backend variant, initializing the store if needed.
    pub async fn backend_kind(&self) -> BackendKind {
        self.backend().await.kind()
    }

    pub(crate) async fn backend(&self) -> Arc<StoreBackend> {
        if let Some(demoted) = self.demoted.get() {
            return Arc::clone(demoted);
        }
        Arc::clone(self.selected.get_or_init(|| self.select_backend()).await)
    }

    async fn select_backend(&self) -> Arc<StoreBackend> {
        let Some(path) = &self.db_path else {
            tracing::info!("durable store backend disabled, using flat backend");
            return Arc::new(StoreBackend::Secondary(FlatBackend::new()));
        };

        let opened = match path.parent() {
            Some(parent) => std::fs::create_dir_all(parent)
                .map_err(|e| Error::BackendUnavailable(format!("failed to create {}: {e}", parent.display()))),
            None => Ok(()),
        };

        let opened = match opened {
            Ok(()) => CacheDb::open(path).await,
            Err(e) => Err(e),
        };

        match opened {
            Ok(db) => {
                tracing::info!(path = %path.display(), "durable store backend initialized");
                Arc::new(StoreBackend::Primary(db))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "durable store backend unavailable, falling back to flat backend"
                );
                Arc::new(StoreBackend::Secondary(FlatBackend::new()))
            }
        }
    }

    fn demote(&self, op: &'static str, error: &Error) {
        if self.demoted.set(Arc::new(StoreBackend::Secondary(FlatBackend::new()))).is_ok() {
            tracing::warn!(op, error = %error, "durable store backend lost, demoted to flat backend");
        }
    }

    /// Run `f` against the active backend, retrying once on the flat
    /// backend if the durable one fails fatally.
    async fn run_on_backend<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, Error>
    where
        F: Fn(Arc<StoreBackend>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let backend = self.backend().await;
        match f(Arc::clone(&backend)).await {
            Err(e) if e.is_fatal_backend() && backend.kind() == BackendKind::PrimaryDurable => {
                self.demote(op, &e);
                f(self.backend().await).await
            }
            other => other,
        }
    }

    /// Write `value` under `key`, resetting its timestamp.
    ///
    /// Writes are best-effort: callers may ignore the result, but a failure
    /// is both logged and returned.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero TTL, `Serialization` if `value` cannot be
    /// encoded, or the backend's write error.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), Error> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::new(key, value, ttl.unwrap_or(self.default_ttl))?;
        let entry = &entry;

        let result = self.run_on_backend("set", |backend| async move { backend.put(entry).await }).await;
        if let Err(e) = &result {
            tracing::warn!(key, error = %e, "store write failed");
        }
        result
    }

    /// Read the value under `key`.
    ///
    /// An expired entry is deleted and reads as absent. Backend failures
    /// also read as absent.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = match self.run_on_backend("get", |backend| async move { backend.get(key).await }).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(key, "store miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired() {
            tracing::debug!(key, "store entry expired");
            let entry = &entry;
            if let Err(e) = self
                .run_on_backend("expire", |backend| async move { backend.delete_if_unchanged(entry).await })
                .await
            {
                tracing::warn!(key, error = %e, "failed to delete expired store entry");
            }
            return None;
        }

        Some(entry.value)
    }

    /// Read and decode the value under `key`. A value of the wrong shape
    /// reads as absent.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has unexpected shape");
                None
            }
        }
    }

    /// Delete `key`. Removing an absent key succeeds.
    pub async fn remove(&self, key: &str) -> Result<(), Error> {
        let result = self.run_on_backend("remove", |backend| async move { backend.delete(key).await }).await;
        if let Err(e) = &result {
            tracing::warn!(key, error = %e, "store remove failed");
        }
        result
    }

    /// Delete every entry this store owns.
    pub async fn clear(&self) -> Result<(), Error> {
        let result = self.run_on_backend("clear", |backend| async move { backend.clear().await }).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "store clear failed");
        }
        result
    }

    /// Delete all expired entries across the store.
    ///
    /// Returns the number of deleted entries.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        let now = now_ms();
        self.run_on_backend("sweep", |backend| async move { backend.purge_expired(now).await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    fn flat_store() -> Store {
        Store::with_backend(StoreBackend::Secondary(FlatBackend::new()), HOUR)
    }

    async fn sqlite_store() -> Store {
        let db = CacheDb::open_in_memory().await.unwrap();
        Store::with_backend(StoreBackend::Primary(db), HOUR)
    }

    fn expired_entry(key: &str, value: serde_json::Value) -> CacheEntry {
        CacheEntry { key: key.to_string(), value, written_at_ms: now_ms() - 10_000, ttl_ms: 1_000 }
    }

    #[tokio::test]
    async fn test_round_trip_both_backends() {
        for store in [flat_store(), sqlite_store().await] {
            store.set("lastLocation", &json!({"lat": 51.51, "lon": -0.13}), None).await.unwrap();
            assert_eq!(store.get("lastLocation").await, Some(json!({"lat": 51.51, "lon": -0.13})));
        }
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_deleted() {
        for store in [flat_store(), sqlite_store().await] {
            let backend = store.backend().await;
            backend.put(&expired_entry("old", json!(1))).await.unwrap();

            assert_eq!(store.get("old").await, None);
            assert!(backend.get("old").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let store = sqlite_store().await;
        store.remove("never-set").await.unwrap();
        store.remove("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = flat_store();
        let result = store.set("k", &1, Some(Duration::ZERO)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = sqlite_store().await;
        store.set("loc", "A", None).await.unwrap();
        store.set("loc", "B", None).await.unwrap();
        assert_eq!(store.get_as::<String>("loc").await.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_corrupt() {
        let store = Arc::new(sqlite_store().await);
        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.set("loc", &json!({"writer": i, "pad": "x".repeat(i * 64)}), None).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let value = store.get("loc").await.unwrap();
        let writer = value["writer"].as_u64().unwrap() as usize;
        assert_eq!(value["pad"].as_str().unwrap().len(), writer * 64);
    }

    #[tokio::test]
    async fn test_get_as_wrong_shape_is_absent() {
        let store = flat_store();
        store.set("k", "text", None).await.unwrap();
        assert_eq!(store.get_as::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = sqlite_store().await;
        store.set("a", &1, None).await.unwrap();
        store.set("b", &2, None).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, None);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = sqlite_store().await;
        store.backend().await.put(&expired_entry("stale", json!(1))).await.unwrap();
        store.set("fresh", &2, None).await.unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.get("fresh").await, Some(json!(2)));
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig { durable_store: false, default_ttl_ms: 5_000, ..Default::default() };
        let config = StoreConfig::from(&app);
        assert!(config.db_path.is_none());
        assert_eq!(config.default_ttl, Duration::from_secs(5));

        let config = StoreConfig::from(&AppConfig::default());
        assert_eq!(config.db_path, Some(PathBuf::from("./fairweather-cache.sqlite")));
    }

    #[tokio::test]
    async fn test_primary_selected_when_openable() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Store::new(StoreConfig { db_path: Some(dir.path().join("nested/cache.sqlite")), default_ttl: HOUR });
        assert_eq!(store.backend_kind().await, BackendKind::PrimaryDurable);
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig { db_path: Some(dir.path().to_path_buf()), default_ttl: HOUR });

        assert_eq!(store.backend_kind().await, BackendKind::SecondaryFlat);
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await, Some(json!("v")));
    }

    #[tokio::test]
    async fn test_disabled_primary_uses_flat() {
        let store = Store::new(StoreConfig { db_path: None, default_ttl: HOUR });
        assert_eq!(store.backend_kind().await, BackendKind::SecondaryFlat);
    }

    #[tokio::test]
    async fn test_concurrent_init_happens_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(StoreConfig { db_path: Some(dir.path().join("cache.sqlite")), default_ttl: HOUR });

        let (a, b, c) = tokio::join!(store.backend(), store.backend(), store.backend());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_closed_primary_demotes_permanently() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = Store::with_backend(StoreBackend::Primary(db.clone()), HOUR);
        store.set("before", &1, None).await.unwrap();

        db.close().await.unwrap();

        store.set("after", &2, None).await.unwrap();
        assert_eq!(store.backend_kind().await, BackendKind::SecondaryFlat);
        assert_eq!(store.get("after").await, Some(json!(2)));
        assert_eq!(store.get("before").await, None);
    }
}
