//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Longest a fetch may wait before the arbitrator falls back.
const MAX_FETCH_TIMEOUT_MS: u64 = 60_000;

/// Largest response body a fetch may buffer.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `default_ttl_ms` is 0
    /// - `sweep_interval_ms` is under one second
    /// - `fetch_timeout_ms` is under 100ms or over 60s
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` or `cache_version` is empty
    /// - `animation_prefix` does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_ms == 0 {
            return Err(invalid("default_ttl_ms", "must be greater than 0"));
        }

        if self.sweep_interval_ms < 1_000 {
            return Err(invalid("sweep_interval_ms", "must be at least 1000ms"));
        }

        if self.fetch_timeout_ms < 100 {
            return Err(invalid("fetch_timeout_ms", "must be at least 100ms"));
        }
        if self.fetch_timeout_ms > MAX_FETCH_TIMEOUT_MS {
            return Err(invalid("fetch_timeout_ms", "must not exceed 60 seconds (60000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > MAX_BODY_BYTES {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        if !self.animation_prefix.starts_with('/') {
            return Err(invalid("animation_prefix", "must start with '/'"));
        }

        if let Some(asset) = self.static_assets.iter().find(|a| !a.starts_with('/')) {
            tracing::warn!(asset = %asset, "static asset path is not absolute and will never match a request");
        }

        if self.api_hosts.is_empty() {
            tracing::warn!("no api_hosts configured; every non-asset request is classified as Other");
        }

        Ok(())
    }
}
