//! Flat string-map backend used when the durable backend is unavailable.
//!
//! Keys live under a fixed namespace prefix and values are the JSON-encoded
//! [`CacheEntry`], so `clear` only touches keys this layer wrote.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::CacheEntry;
use crate::Error;

/// Prefix applied to every key written by this backend.
const NAMESPACE: &str = "weather_";

fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}{key}")
}

/// In-process flat key-value backend.
#[derive(Debug, Default)]
pub struct FlatBackend {
    items: RwLock<HashMap<String, String>>,
}

impl FlatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        let encoded = serde_json::to_string(entry)?;
        self.items.write().await.insert(namespaced(&entry.key), encoded);
        Ok(())
    }

    /// Read an entry. Undecodable data reads as absent.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let items = self.items.read().await;
        let Some(raw) = items.get(&namespaced(key)) else {
            return Ok(None);
        };

        match serde_json::from_str(raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable flat store entry");
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        self.items.write().await.remove(&namespaced(key));
        Ok(())
    }

    /// Delete `entry.key` only if it still holds the write described by `entry`.
    pub async fn delete_if_unchanged(&self, entry: &CacheEntry) -> Result<bool, Error> {
        let mut items = self.items.write().await;
        let slot = namespaced(&entry.key);
        let unchanged = items
            .get(&slot)
            .and_then(|raw| serde_json::from_str::<CacheEntry>(raw).ok())
            .is_some_and(|current| current.written_at_ms == entry.written_at_ms);

        if unchanged {
            items.remove(&slot);
        }
        Ok(unchanged)
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.items.write().await.retain(|key, _| !key.starts_with(NAMESPACE));
        Ok(())
    }

    /// Delete every namespaced entry expired at `now_ms`, plus undecodable ones.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<u64, Error> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|key, raw| {
            if !key.starts_with(NAMESPACE) {
                return true;
            }
            serde_json::from_str::<CacheEntry>(raw).is_ok_and(|entry| !entry.is_expired_at(now_ms))
        });
        Ok((before - items.len()) as u64)
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, key: &str, raw: &str) {
        self.items.write().await.insert(key.to_string(), raw.to_string());
    }
}
