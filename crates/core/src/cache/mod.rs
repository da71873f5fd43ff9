//! SQLite-backed persistence shared by the durable store and the cache tiers.
//!
//! This module provides a single database with async access via
//! tokio-rusqlite. It supports:
//!
//! - Expiring key-value entries for the durable store backend
//! - Versioned request/response tiers keyed by SHA-256 request identity
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod tier_entries;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::compute_request_key;
pub use tier_entries::OnConflict;
