//! Expiring entry CRUD for the durable store backend.

use super::connection::CacheDb;
use crate::Error;
use crate::store::CacheEntry;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Insert or replace an entry.
    ///
    /// The whole row is replaced in one statement, so a concurrent reader
    /// sees either the previous entry or this one.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let key = entry.key.clone();
        let value_json = serde_json::to_string(&entry.value)?;
        let written_at_ms = entry.written_at_ms;
        let ttl_ms = entry.ttl_ms;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO store_entries (key, value_json, written_at_ms, ttl_ms)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        written_at_ms = excluded.written_at_ms,
                        ttl_ms = excluded.ttl_ms",
                    params![key, value_json, written_at_ms, ttl_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key, expired or not.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt =
                    conn.prepare("SELECT key, value_json, written_at_ms, ttl_ms FROM store_entries WHERE key = ?1")?;

                let row = stmt.query_row(params![key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                });

                match row {
                    Ok((key, value_json, written_at_ms, ttl_ms)) => {
                        let value = serde_json::from_str(&value_json)?;
                        Ok(Some(CacheEntry { key, value, written_at_ms, ttl_ms }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry. Deleting a missing key is not an error.
    pub async fn delete_entry(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM store_entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete `entry.key` only if it still holds the write described by `entry`.
    ///
    /// Used by lazy expiration so a read that observed an expired entry
    /// cannot delete a fresh value written in the meantime.
    pub async fn delete_entry_if_unchanged(&self, entry: &CacheEntry) -> Result<bool, Error> {
        let key = entry.key.clone();
        let written_at_ms = entry.written_at_ms;
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM store_entries WHERE key = ?1 AND written_at_ms = ?2",
                    params![key, written_at_ms],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all entries.
    pub async fn clear_entries(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM store_entries", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry expired at `now_ms`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self, now_ms: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM store_entries WHERE ?1 - written_at_ms > ttl_ms",
                    params![now_ms],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries, expired ones included.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM store_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
