//! Core of the fairweather offline caching layer.
//!
//! This crate provides:
//! - An expiring key-value store with a durable SQLite backend and a flat
//!   in-process fallback, behind a single async façade
//! - Versioned request/response cache tiers with orphan eviction
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tiers;

pub use cache::{CacheDb, compute_request_key};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{BackendKind, CacheEntry, Location, Store, StoreBackend, StoreConfig, SweepHandle, spawn_sweeper};
pub use tiers::{ActiveTiers, CachedResponse, TierKind, TierManager, TierNames};
