//! Versioned request/response tiers.
//!
//! Two tiers exist per build: `static` for build artifacts (append-only
//! while the build lives) and `dynamic` for runtime responses (replaced on
//! every successful fetch). Tier names carry the build's cache version;
//! any other tier found in the database is an orphan from a previous build.
//!
//! [`TierManager::activate`] evicts orphans and is the only way to obtain
//! [`ActiveTiers`], so no lookup or store can happen before eviction is done.

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheDb, OnConflict};

/// A response as persisted in a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC 3339 time the response was written into the tier.
    pub stored_at: String,
}

/// Which of the two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Static,
    Dynamic,
}

impl TierKind {
    fn on_conflict(self) -> OnConflict {
        match self {
            TierKind::Static => OnConflict::Keep,
            TierKind::Dynamic => OnConflict::Replace,
        }
    }
}

/// The versioned names of the current build's tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierNames {
    pub static_tier: String,
    pub dynamic_tier: String,
}

impl TierNames {
    /// Tier names for a cache version, e.g. `weather-static-v1`.
    pub fn for_version(version: &str) -> Self {
        Self { static_tier: format!("weather-static-{version}"), dynamic_tier: format!("weather-dynamic-{version}") }
    }

    pub fn name(&self, kind: TierKind) -> &str {
        match kind {
            TierKind::Static => &self.static_tier,
            TierKind::Dynamic => &self.dynamic_tier,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.static_tier || name == self.dynamic_tier
    }
}

/// Owner of the tier lifecycle before activation.
#[derive(Debug, Clone)]
pub struct TierManager {
    db: CacheDb,
}

impl TierManager {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    /// Delete every tier not named in `expected` and start serving.
    ///
    /// # Errors
    ///
    /// Returns the database error if tiers cannot be listed or deleted.
    pub async fn activate(self, expected: TierNames) -> Result<ActiveTiers, Error> {
        let active = ActiveTiers { db: self.db, names: expected };
        let evicted = active.evict_orphans().await?;
        tracing::info!(
            static_tier = %active.names.static_tier,
            dynamic_tier = %active.names.dynamic_tier,
            evicted = evicted.len(),
            "cache tiers activated"
        );
        Ok(active)
    }
}

/// Tiers after activation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ActiveTiers {
    db: CacheDb,
    names: TierNames,
}

impl ActiveTiers {
    pub fn names(&self) -> &TierNames {
        &self.names
    }

    /// Delete every tier that is not one of the current names.
    ///
    /// Returns the names of the deleted tiers.
    pub async fn evict_orphans(&self) -> Result<Vec<String>, Error> {
        let mut evicted = Vec::new();
        for name in self.db.list_tiers().await? {
            if self.names.contains(&name) {
                continue;
            }
            if self.db.delete_tier(&name).await? {
                tracing::info!(tier = %name, "deleted orphaned cache tier");
                evicted.push(name);
            }
        }
        Ok(evicted)
    }

    /// Names of the tiers that currently exist (have been written to).
    pub async fn existing(&self) -> Result<Vec<String>, Error> {
        self.db.list_tiers().await
    }

    /// Look up `request_key` in one tier. A miss is `Ok(None)`.
    pub async fn lookup(&self, kind: TierKind, request_key: &str) -> Result<Option<CachedResponse>, Error> {
        self.db.get_tier_response(self.names.name(kind), request_key).await
    }

    /// Look up `request_key` in the static tier, then the dynamic tier.
    pub async fn lookup_any(&self, request_key: &str) -> Result<Option<(TierKind, CachedResponse)>, Error> {
        for kind in [TierKind::Static, TierKind::Dynamic] {
            if let Some(response) = self.lookup(kind, request_key).await? {
                return Ok(Some((kind, response)));
            }
        }
        Ok(None)
    }

    /// Associate `response` with `request_key` in a tier.
    ///
    /// The dynamic tier always takes the new response. The static tier keeps
    /// an existing association and returns `false`.
    pub async fn store(&self, kind: TierKind, request_key: &str, response: &CachedResponse) -> Result<bool, Error> {
        let written = self
            .db
            .put_tier_response(self.names.name(kind), request_key, response, kind.on_conflict())
            .await?;
        if written {
            tracing::debug!(tier = %self.names.name(kind), url = %response.url, "stored response in tier");
        }
        Ok(written)
    }

    pub async fn entry_count(&self, kind: TierKind) -> Result<u64, Error> {
        self.db.count_tier_entries(self.names.name(kind)).await
    }
}
