//! Tier and tier-entry persistence.
//!
//! A tier row is created lazily by the first successful write into it and
//! removed wholesale (entries cascade) on eviction.

use super::connection::CacheDb;
use crate::Error;
use crate::tiers::CachedResponse;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// What to do when a tier already holds an association for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Replace,
    Keep,
}

impl CacheDb {
    /// Names of all tiers that currently exist.
    pub async fn list_tiers(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM tiers ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a tier and all of its entries.
    ///
    /// Returns whether the tier existed.
    pub async fn delete_tier(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM tiers WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under `request_key` in `tier`, creating the tier if needed.
    ///
    /// Returns `false` when `on_conflict` is `Keep` and an association
    /// already existed.
    pub async fn put_tier_response(
        &self, tier: &str, request_key: &str, response: &CachedResponse, on_conflict: OnConflict,
    ) -> Result<bool, Error> {
        let tier = tier.to_string();
        let request_key = request_key.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO tiers (name, created_at) VALUES (?1, ?2)",
                    params![tier, response.stored_at],
                )?;

                let sql = match on_conflict {
                    OnConflict::Replace => {
                        "INSERT INTO tier_entries (
                            tier, request_key, url, status, content_type, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(tier, request_key) DO UPDATE SET
                            url = excluded.url,
                            status = excluded.status,
                            content_type = excluded.content_type,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at"
                    }
                    OnConflict::Keep => {
                        "INSERT INTO tier_entries (
                            tier, request_key, url, status, content_type, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(tier, request_key) DO NOTHING"
                    }
                };

                let written = tx.execute(
                    sql,
                    params![
                        tier,
                        request_key,
                        response.url,
                        response.status,
                        response.content_type,
                        headers_json,
                        response.body,
                        response.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the response stored under `request_key` in `tier`.
    pub async fn get_tier_response(&self, tier: &str, request_key: &str) -> Result<Option<CachedResponse>, Error> {
        let tier = tier.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, content_type, headers_json, body, stored_at
                    FROM tier_entries WHERE tier = ?1 AND request_key = ?2",
                )?;

                let row = stmt.query_row(params![tier, request_key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match row {
                    Ok((url, status, content_type, headers_json, body, stored_at)) => Ok(Some(CachedResponse {
                        url,
                        status,
                        content_type,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of associations held by `tier`.
    pub async fn count_tier_entries(&self, tier: &str) -> Result<u64, Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM tier_entries WHERE tier = ?1", params![tier], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
